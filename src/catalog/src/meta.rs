// Copyright 2024 shardq Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use shardq_common::{ColumnType, Predicate};

/// HFRAG or VFRAG, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragType {
    Hfrag,
    Vfrag,
}

/// A single `(site, frag_name)` for an HFRAG table: a disjoint predicate
/// set over the table's full-row schema.
#[derive(Debug, Clone)]
pub struct HFragment {
    pub frag_name: String,
    pub preds: Vec<Predicate>,
}

/// A single `(site, frag_name)` for a VFRAG table: the column subset this
/// fragment materializes (must include the shared join column).
#[derive(Debug, Clone)]
pub struct VFragment {
    pub frag_name: String,
    pub columns: Vec<String>,
}

/// In-memory fragment metadata for one logical table.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub name: String,
    pub frag_type: FragType,
    pub columns: Vec<String>,
    pub column_type: HashMap<String, ColumnType>,
    pub hfrag: HashMap<String, HFragment>,
    pub vfrag: HashMap<String, VFragment>,
}

impl TableMeta {
    pub fn new(name: impl Into<String>, frag_type: FragType) -> Self {
        Self {
            name: name.into(),
            frag_type,
            columns: Vec::new(),
            column_type: HashMap::new(),
            hfrag: HashMap::new(),
            vfrag: HashMap::new(),
        }
    }

    /// The column shared by every V-fragment of this table — the "join
    /// column" of §4.2. `None` if there are no V-fragments, or this is not
    /// a VFRAG table.
    pub fn vfrag_join_column(&self) -> Option<String> {
        if self.frag_type != FragType::Vfrag {
            return None;
        }
        let mut iter = self.vfrag.values();
        let first = iter.next()?;
        first
            .columns
            .iter()
            .find(|c| self.vfrag.values().all(|f| f.columns.contains(c)))
            .cloned()
    }

    /// Every `(site, frag_name)` pair for this table, regardless of
    /// fragmentation mode.
    pub fn fragment_sites(&self) -> Vec<&str> {
        match self.frag_type {
            FragType::Hfrag => self.hfrag.keys().map(String::as_str).collect(),
            FragType::Vfrag => self.vfrag.keys().map(String::as_str).collect(),
        }
    }
}

/// `{ sites: [site_name], tables: {name: TableMeta} }`, per §3.
#[derive(Debug, Clone, Default)]
pub struct DatabaseMeta {
    pub sites: Vec<String>,
    pub tables: HashMap<String, TableMeta>,
}

impl DatabaseMeta {
    pub fn register_site(&mut self, site: &str) {
        if !self.sites.iter().any(|s| s == site) {
            self.sites.push(site.to_string());
        }
    }
}
