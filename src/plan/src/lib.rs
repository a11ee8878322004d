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

pub mod builder;
pub mod node;
pub mod pushdown;

pub use builder::{build_distributed_read, build_raw_tree};
pub use node::{NJoinNode, PlanNode, ProjectionNode, ReadTableNode, RenameNode, SelectionNode, UnionNode};
pub use pushdown::optimize;

use shardq_catalog::DatabaseMeta;
use shardq_common::Result;
use shardq_sqlfront::SelectStmt;

/// Builds and fully optimizes the plan for a `SELECT`, per §4.2-§4.4: raw
/// tree, push-down, trim, site labeling. Returns `Ok(None)` for a query
/// that is provably empty (every candidate fragment pruned away).
pub fn plan_select(stmt: &SelectStmt, db: &DatabaseMeta) -> Result<Option<PlanNode>> {
    let raw = build_raw_tree(stmt, db)?;
    Ok(optimize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardq_catalog::ddl::process_create_meta;
    use shardq_common::{CompareOp, PredRhs, Predicate, Value};

    #[test]
    fn plan_select_prunes_to_none_when_every_fragment_is_disabled() {
        let mut db = DatabaseMeta::default();
        for line in [
            "CREATEMETA T Publisher ON HFRAG WHERE id:int name:str",
            "CREATEMETA H node0.p1 ON Publisher WHERE id < 100",
            "CREATEMETA H node1.p2 ON Publisher WHERE id >= 100",
        ] {
            assert!(process_create_meta(line, &mut db));
        }
        let stmt = SelectStmt {
            tables: vec!["Publisher".to_string()],
            projected_cols: vec!["Publisher.name".to_string()],
            join_preds: vec![],
            filter_preds: vec![
                Predicate::new("Publisher.id", CompareOp::Lt, PredRhs::Literal(Value::Int(50))),
                Predicate::new("Publisher.id", CompareOp::Ge, PredRhs::Literal(Value::Int(200))),
            ],
        };
        let plan = plan_select(&stmt, &db).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn plan_select_survives_for_a_satisfiable_filter() {
        let mut db = DatabaseMeta::default();
        for line in [
            "CREATEMETA T Publisher ON HFRAG WHERE id:int name:str",
            "CREATEMETA H node0.p1 ON Publisher WHERE id < 100",
            "CREATEMETA H node1.p2 ON Publisher WHERE id >= 100",
        ] {
            assert!(process_create_meta(line, &mut db));
        }
        let stmt = SelectStmt {
            tables: vec!["Publisher".to_string()],
            projected_cols: vec!["Publisher.name".to_string()],
            join_preds: vec![],
            filter_preds: vec![Predicate::new(
                "Publisher.id",
                CompareOp::Lt,
                PredRhs::Literal(Value::Int(50)),
            )],
        };
        let plan = plan_select(&stmt, &db).unwrap();
        assert!(plan.is_some());
    }
}
