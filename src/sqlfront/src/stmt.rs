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

use shardq_common::{Predicate, Value};

/// The normalized form of a `SELECT`, per §4.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStmt {
    pub tables: Vec<String>,
    pub projected_cols: Vec<String>,
    pub join_preds: Vec<Predicate>,
    pub filter_preds: Vec<Predicate>,
}

/// The normalized form of an `INSERT`, per §4.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStmt {
    pub table: String,
    pub cols: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// A `DELETE ... WHERE ...`; supplements the distilled spec (§6 lists
/// `delete` as a CLI verb without detailing its algebra). Unlike SELECT,
/// deletes are not pushed through the optimizer's pruning pass — every
/// fragment of the table is sent a rewritten, fragment-qualified delete
/// (see `shardq_batch::delete`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteStmt {
    pub table: String,
    pub filter_preds: Vec<Predicate>,
}
