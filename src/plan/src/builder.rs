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

use std::collections::{HashMap, HashSet};

use shardq_catalog::{DatabaseMeta, FragType, TableMeta};
use shardq_common::{split_qualified, PredRhs, Predicate, Result, ShardqError};
use shardq_sqlfront::SelectStmt;

use crate::node::PlanNode;

/// Builds the per-table distributed-read subtree for `table_name` (§4.2):
/// a `Union` over its H-fragments, or an `NJoin` over its V-fragments keyed
/// on the shared join column. Either way the subtree is tagged with
/// `retag_as = table_name` so a later `Rename` can restore the logical
/// table name once fragment branches have been collapsed by `copy`.
pub fn build_distributed_read(table_name: &str, db: &DatabaseMeta) -> Result<PlanNode> {
    let table: &TableMeta = db
        .tables
        .get(table_name)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table '{table_name}'")))?;

    match table.frag_type {
        FragType::Hfrag => {
            if table.hfrag.is_empty() {
                return Err(ShardqError::catalog(format!(
                    "table '{table_name}' has no H-fragments registered"
                )));
            }
            let mut children: Vec<PlanNode> = table
                .hfrag
                .iter()
                .map(|(site, frag)| {
                    PlanNode::read_table(
                        site.clone(),
                        frag.frag_name.clone(),
                        table_name,
                        table.columns.clone(),
                        frag.preds.clone(),
                    )
                })
                .collect();
            children.sort_by(|a, b| site_frag_key(a).cmp(&site_frag_key(b)));
            Ok(PlanNode::union(children, Some(table_name.to_string())))
        }
        FragType::Vfrag => {
            if table.vfrag.is_empty() {
                return Err(ShardqError::catalog(format!(
                    "table '{table_name}' has no V-fragments registered"
                )));
            }
            let join_col = table.vfrag_join_column().ok_or_else(|| {
                ShardqError::catalog(format!(
                    "table '{table_name}' has no column shared by every V-fragment"
                ))
            })?;
            let mut children: Vec<PlanNode> = table
                .vfrag
                .iter()
                .map(|(site, frag)| {
                    PlanNode::read_table(
                        site.clone(),
                        frag.frag_name.clone(),
                        table_name,
                        frag.columns.clone(),
                        Vec::new(),
                    )
                })
                .collect();
            children.sort_by(|a, b| site_frag_key(a).cmp(&site_frag_key(b)));
            Ok(PlanNode::njoin(
                vec![join_col],
                children,
                Some(table_name.to_string()),
            ))
        }
    }
}

fn site_frag_key(node: &PlanNode) -> String {
    match node {
        PlanNode::ReadTable(rt) => format!("{}.{}", rt.site, rt.frag),
        _ => String::new(),
    }
}

/// Builds the raw (un-pushed-down) plan tree for a normalized `SELECT`,
/// per §4.2: `Projection -> Selection -> <join-spanning-tree>`, where the
/// join-spanning-tree is a left-deep chain of binary `NJoin`s connecting
/// every referenced table via `join_preds`.
pub fn build_raw_tree(stmt: &SelectStmt, db: &DatabaseMeta) -> Result<PlanNode> {
    if stmt.tables.is_empty() {
        return Err(ShardqError::parse("select statement names no tables"));
    }

    let join_tree = build_join_spanning_tree(&stmt.tables, &stmt.join_preds, db)?;

    let with_filter = if stmt.filter_preds.is_empty() {
        join_tree
    } else {
        PlanNode::selection(stmt.filter_preds.clone(), join_tree)
    };

    Ok(PlanNode::projection(stmt.projected_cols.clone(), with_filter))
}

/// `table -> [(other_table, predicate connecting them)]`, built from the
/// (already oriented-by-SQL-text) join predicates.
fn build_adjacency<'a>(
    join_preds: &'a [Predicate],
) -> HashMap<String, Vec<(String, &'a Predicate)>> {
    let mut adj: HashMap<String, Vec<(String, &Predicate)>> = HashMap::new();
    for pred in join_preds {
        let PredRhs::Column(right_col) = &pred.right else {
            continue;
        };
        let (lt, _) = split_qualified(&pred.left);
        let (rt, _) = split_qualified(right_col);
        if lt.is_empty() || rt.is_empty() {
            continue;
        }
        adj.entry(lt.to_string())
            .or_default()
            .push((rt.to_string(), pred));
        adj.entry(rt.to_string())
            .or_default()
            .push((lt.to_string(), pred));
    }
    adj
}

/// Re-orients a join predicate so its first element is always the column
/// on `current`'s side and its second the column on `other`'s side,
/// regardless of which side the original SQL text put `current` on.
fn orient_pred(pred: &Predicate, current: &str, other: &str) -> Result<(String, String)> {
    let PredRhs::Column(right_col) = &pred.right else {
        return Err(ShardqError::internal("join predicate has a literal rhs"));
    };
    let (lt, _) = split_qualified(&pred.left);
    let (rt, _) = split_qualified(right_col);
    if lt == current && rt == other {
        Ok((pred.left.clone(), right_col.clone()))
    } else if lt == other && rt == current {
        Ok((right_col.clone(), pred.left.clone()))
    } else {
        Err(ShardqError::internal(format!(
            "join predicate {}/{} does not connect {current} and {other}",
            pred.left, right_col
        )))
    }
}

fn build_join_spanning_tree(
    tables: &[String],
    join_preds: &[Predicate],
    db: &DatabaseMeta,
) -> Result<PlanNode> {
    if tables.len() == 1 {
        return build_distributed_read(&tables[0], db);
    }

    let adj = build_adjacency(join_preds);
    let start = tables
        .iter()
        .min_by_key(|t| adj.get(*t).map(|v| v.len()).unwrap_or(0))
        .cloned()
        .ok_or_else(|| ShardqError::internal("empty table list"))?;

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.clone());
    let mut acc = build_distributed_read(&start, db)?;
    acc = grow_join_tree(acc, &start, &adj, &mut visited, db)?;

    for t in tables {
        if !visited.contains(t) {
            return Err(ShardqError::parse(format!(
                "table '{t}' is not connected to the rest of the query by a join predicate"
            )));
        }
    }
    Ok(acc)
}

/// Extends `acc` (the join tree built so far, whose frontier is
/// `current`) by visiting every not-yet-visited neighbor of `current`,
/// wrapping `acc` in a new binary `NJoin` for each one and recursing into
/// that neighbor to keep extending the *same* accumulator. Produces a
/// left-deep chain rather than a bushy tree.
fn grow_join_tree(
    acc: PlanNode,
    current: &str,
    adj: &HashMap<String, Vec<(String, &Predicate)>>,
    visited: &mut HashSet<String>,
    db: &DatabaseMeta,
) -> Result<PlanNode> {
    let mut acc = acc;
    let Some(neighbors) = adj.get(current) else {
        return Ok(acc);
    };
    // Stable order so repeated planning of the same query is deterministic.
    let mut neighbors: Vec<&(String, &Predicate)> = neighbors.iter().collect();
    neighbors.sort_by(|a, b| a.0.cmp(&b.0));

    for (other, pred) in neighbors {
        if visited.contains(other) {
            continue;
        }
        visited.insert(other.clone());
        let (cur_col, other_col) = orient_pred(pred, current, other)?;
        let other_subtree = build_distributed_read(other, db)?;
        acc = PlanNode::njoin(vec![cur_col, other_col], vec![acc, other_subtree], None);
        acc = grow_join_tree(acc, other, adj, visited, db)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardq_catalog::ddl::process_create_meta;
    use shardq_common::CompareOp;

    fn publisher_db() -> DatabaseMeta {
        let mut db = DatabaseMeta::default();
        for line in [
            "CREATEMETA T Publisher ON HFRAG WHERE id:int name:str nation:str",
            "CREATEMETA H node0.p1 ON Publisher WHERE id < 104000",
            "CREATEMETA H node1.p2 ON Publisher WHERE id >= 104000",
        ] {
            assert!(process_create_meta(line, &mut db));
        }
        db
    }

    fn customer_db() -> DatabaseMeta {
        let mut db = DatabaseMeta::default();
        for line in [
            "CREATEMETA T Customer ON VFRAG WHERE id:int name:str rank:str",
            "CREATEMETA V node0.c1 ON Customer WHERE id name",
            "CREATEMETA V node1.c2 ON Customer WHERE id rank",
        ] {
            assert!(process_create_meta(line, &mut db));
        }
        db
    }

    #[test]
    fn hfrag_table_builds_a_union_of_fragments() {
        let db = publisher_db();
        let node = build_distributed_read("Publisher", &db).unwrap();
        match node {
            PlanNode::Union(u) => {
                assert_eq!(u.children.len(), 2);
                assert_eq!(u.retag_as.as_deref(), Some("Publisher"));
            }
            other => panic!("expected Union, got {other:?}"),
        }
    }

    #[test]
    fn vfrag_table_builds_an_njoin_on_the_shared_column() {
        let db = customer_db();
        let node = build_distributed_read("Customer", &db).unwrap();
        match node {
            PlanNode::NJoin(j) => {
                assert_eq!(j.children.len(), 2);
                assert_eq!(j.join_cols, vec!["id".to_string()]);
                assert_eq!(j.retag_as.as_deref(), Some("Customer"));
            }
            other => panic!("expected NJoin, got {other:?}"),
        }
    }

    #[test]
    fn raw_tree_for_two_joined_tables_is_projection_over_njoin() {
        let mut db = publisher_db();
        for line in [
            "CREATEMETA T Book ON HFRAG WHERE id:int title:str pubid:int",
            "CREATEMETA H node0.b1 ON Book WHERE id < 200000",
        ] {
            assert!(process_create_meta(line, &mut db));
        }
        let stmt = SelectStmt {
            tables: vec!["Publisher".to_string(), "Book".to_string()],
            projected_cols: vec!["Publisher.name".to_string(), "Book.title".to_string()],
            join_preds: vec![Predicate::new(
                "Publisher.id",
                CompareOp::Eq,
                PredRhs::Column("Book.pubid".to_string()),
            )],
            filter_preds: vec![],
        };
        let tree = build_raw_tree(&stmt, &db).unwrap();
        match tree {
            PlanNode::Projection(p) => match *p.child {
                PlanNode::NJoin(j) => assert_eq!(j.join_cols.len(), 2),
                other => panic!("expected NJoin under projection, got {other:?}"),
            },
            other => panic!("expected Projection at the root, got {other:?}"),
        }
    }

    #[test]
    fn unconnected_table_is_rejected() {
        let mut db = publisher_db();
        for line in ["CREATEMETA T Orphan ON HFRAG WHERE id:int", "CREATEMETA H node0.o1 ON Orphan WHERE id < 5"] {
            assert!(process_create_meta(line, &mut db));
        }
        let stmt = SelectStmt {
            tables: vec!["Publisher".to_string(), "Orphan".to_string()],
            projected_cols: vec!["Publisher.name".to_string()],
            join_preds: vec![],
            filter_preds: vec![],
        };
        assert!(build_raw_tree(&stmt, &db).is_err());
    }
}
