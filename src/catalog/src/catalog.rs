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
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use shardq_common::{Result, ShardqError};

use crate::ddl::{parse_create_table, process_create_meta};
use crate::meta::DatabaseMeta;

/// Root catalog: an in-memory structure mutated only by DDL/control paths,
/// backed by a per-database flat file of DDL lines (§4.1's "single
/// metadata relation holding DDL lines"). Shared across the coordinator by
/// `Arc`; mutation is exclusive with query planning per §5.
#[derive(Clone)]
pub struct Catalog {
    base_dir: PathBuf,
    databases: Arc<RwLock<HashMap<String, DatabaseMeta>>>,
}

impl Catalog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            databases: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn meta_path(&self, db_name: &str) -> PathBuf {
        self.base_dir.join(format!("{db_name}.meta"))
    }

    /// Creates or opens a per-coordinator store for `db_name`. On first
    /// open the backing file is created empty; on subsequent opens the
    /// persisted DDL lines are replayed through `process_create_meta` to
    /// rebuild the in-memory `DatabaseMeta`.
    pub fn add_db(&self, db_name: &str) -> Result<()> {
        let path = self.meta_path(db_name);
        let mut meta = DatabaseMeta::default();
        if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ShardqError::internal(format!("reading {path:?}: {e}")))?;
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !process_create_meta(line, &mut meta) {
                    tracing::warn!(line, db_name, "rejected malformed persisted DDL line");
                }
            }
        } else {
            std::fs::File::create(&path)
                .map_err(|e| ShardqError::internal(format!("creating {path:?}: {e}")))?;
        }
        self.databases
            .write()
            .unwrap()
            .insert(db_name.to_string(), meta);
        Ok(())
    }

    pub fn close_db(&self, db_name: &str) {
        self.databases.write().unwrap().remove(db_name);
    }

    fn append_lines(&self, db_name: &str, lines: &[&str]) -> Result<()> {
        let path = self.meta_path(db_name);
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ShardqError::internal(format!("opening {path:?}: {e}")))?;
        for line in lines {
            writeln!(f, "{line}").map_err(|e| ShardqError::internal(e.to_string()))?;
        }
        Ok(())
    }

    /// Applies a `CREATE TABLE` definition (`<table-info-stmt>|<meta-stmt>|…`)
    /// to `db_name`, persists every accepted line, and returns the
    /// site-local `CREATE TABLE` SQL each owning site must run.
    pub fn create_table(
        &self,
        db_name: &str,
        def: &str,
    ) -> Result<HashMap<String, String>> {
        let mut dbs = self.databases.write().unwrap();
        let meta = dbs
            .get_mut(db_name)
            .ok_or_else(|| ShardqError::catalog(format!("unknown database {db_name}")))?;
        let site_ddl = parse_create_table(def, meta);
        drop(dbs);
        let lines: Vec<&str> = def.split('|').map(str::trim).filter(|s| !s.is_empty()).collect();
        self.append_lines(db_name, &lines)?;
        Ok(site_ddl)
    }

    pub fn with_db<T>(&self, db_name: &str, f: impl FnOnce(&DatabaseMeta) -> T) -> Result<T> {
        let dbs = self.databases.read().unwrap();
        let meta = dbs
            .get(db_name)
            .ok_or_else(|| ShardqError::catalog(format!("unknown database {db_name}")))?;
        Ok(f(meta))
    }

    pub fn snapshot(&self, db_name: &str) -> Result<DatabaseMeta> {
        self.with_db(db_name, Clone::clone)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_db_then_create_table_persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        catalog.add_db("demo").unwrap();
        let site_ddl = catalog
            .create_table(
                "demo",
                "CREATEMETA T Book ON HFRAG WHERE id:int title:str|\
                 CREATEMETA H node0.b1 ON Book WHERE id < 200000",
            )
            .unwrap();
        assert_eq!(site_ddl.len(), 1);

        // Reopening a database replays the persisted DDL lines.
        let catalog2 = Catalog::new(dir.path());
        catalog2.add_db("demo").unwrap();
        let snap = catalog2.snapshot("demo").unwrap();
        assert!(snap.tables.contains_key("Book"));
        assert_eq!(snap.tables["Book"].hfrag.len(), 1);
    }

    #[test]
    fn unknown_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        assert!(catalog.snapshot("nope").is_err());
    }
}
