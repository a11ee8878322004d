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
//
// The pruning pass (§4.3) walks the raw tree top-down threading two
// things: the columns the parent actually needs, and the predicates
// accumulated on the way down. At each `ReadTable` leaf both are applied
// directly to the fragment's own column list and predicate list, and a
// fragment is `disabled` outright if the merged predicates are provably
// contradictory (no row could ever satisfy them). A second, bottom-up
// pass (`copy`) then drops disabled/skipped nodes and synthesizes the
// `Rename` nodes that restore logical table names at retag boundaries.

use std::collections::HashSet;

use shardq_common::{qualify, split_qualified, unqualified, CompareOp, PredRhs, Predicate, Value};

use crate::node::{NJoinNode, PlanNode, UnionNode};

fn columns_referenced(preds: &[Predicate]) -> Vec<String> {
    let mut out = Vec::new();
    for p in preds {
        out.push(p.left.clone());
        if let PredRhs::Column(c) = &p.right {
            out.push(c.clone());
        }
    }
    out
}

/// Predicates from `preds` that apply to `table` (qualified by `table` or
/// left bare), rewritten to the bare column names `ReadTable` expects.
fn preds_for_table(preds: &[Predicate], table: &str) -> Vec<Predicate> {
    preds
        .iter()
        .filter(|p| {
            let (q, _) = split_qualified(&p.left);
            q.is_empty() || q == table
        })
        .map(|p| {
            let right = match &p.right {
                PredRhs::Literal(v) => PredRhs::Literal(v.clone()),
                PredRhs::Column(c) => PredRhs::Column(unqualified(c).to_string()),
            };
            Predicate::new(unqualified(&p.left).to_string(), p.op, right)
        })
        .collect()
}

fn cols_for_table(cols: &[String], table: &str) -> Vec<String> {
    let mut out: Vec<String> = cols
        .iter()
        .filter(|c| {
            let (q, _) = split_qualified(c);
            q.is_empty() || q == table
        })
        .map(|c| unqualified(c).to_string())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// True if `preds` can never all hold at once for a single row: two
/// literal-equality predicates on the same column with different values,
/// or a numeric range whose lower bound exceeds its upper bound.
fn has_contradiction(preds: &[Predicate]) -> bool {
    let mut eq_values: Vec<(&str, &Value)> = Vec::new();
    let mut lower: Vec<(&str, i64, bool)> = Vec::new(); // (col, bound, inclusive)
    let mut upper: Vec<(&str, i64, bool)> = Vec::new();

    for p in preds {
        let PredRhs::Literal(v) = &p.right else {
            continue;
        };
        match p.op {
            CompareOp::Eq => {
                for (c, existing) in &eq_values {
                    if *c == p.left.as_str() && *existing != v {
                        return true;
                    }
                }
                eq_values.push((&p.left, v));
            }
            CompareOp::Gt | CompareOp::Ge => {
                if let Value::Int(n) = v {
                    lower.push((&p.left, *n, p.op == CompareOp::Ge));
                }
            }
            CompareOp::Lt | CompareOp::Le => {
                if let Value::Int(n) = v {
                    upper.push((&p.left, *n, p.op == CompareOp::Le));
                }
            }
            CompareOp::Ne => {}
        }
    }
    for (col, lo, lo_incl) in &lower {
        for (col2, hi, hi_incl) in &upper {
            if col == col2 {
                let contradicts = if *lo_incl && *hi_incl {
                    lo > hi
                } else {
                    lo >= hi
                };
                if contradicts {
                    return true;
                }
            }
        }
    }
    false
}

/// Threads `required_cols` (what the parent needs out of this subtree,
/// qualified names) and `inherited_preds` (accumulated filter/join
/// predicates, qualified names) down to the leaves.
pub fn push_down(node: &mut PlanNode, required_cols: &[String], inherited_preds: &[Predicate]) {
    match node {
        PlanNode::Projection(p) => {
            push_down(&mut p.child, &p.cols, inherited_preds);
            let child_cols: HashSet<&str> = p.cols.iter().map(String::as_str).collect();
            let parent_cols: HashSet<&str> = required_cols.iter().map(String::as_str).collect();
            p.skipped = !p.cols.is_empty() && child_cols == parent_cols;
        }
        PlanNode::Selection(s) => {
            let mut combined = inherited_preds.to_vec();
            combined.extend(s.preds.clone());
            let mut child_required = required_cols.to_vec();
            child_required.extend(columns_referenced(&s.preds));
            push_down(&mut s.child, &child_required, &combined);
            s.skipped = preds_fully_absorbed(&s.child, &s.preds);
        }
        PlanNode::Rename(r) => {
            push_down(&mut r.child, required_cols, inherited_preds);
        }
        PlanNode::ReadTable(rt) => {
            let own_preds = preds_for_table(inherited_preds, &rt.orig_logical_table);
            rt.preds.extend(own_preds);
            rt.preds.dedup();
            if has_contradiction(&rt.preds) {
                rt.disabled = true;
                return;
            }
            let mut cols = cols_for_table(required_cols, &rt.orig_logical_table);
            for p in &rt.preds {
                if !cols.contains(&p.left) {
                    cols.push(p.left.clone());
                }
            }
            if !cols.is_empty() {
                rt.cols.retain(|c| cols.contains(c));
                for c in &cols {
                    if !rt.cols.contains(c) {
                        rt.cols.push(c.clone());
                    }
                }
            }
        }
        PlanNode::NJoin(n) => push_down_fanout(
            &mut n.children,
            &n.join_cols.clone(),
            n.retag_as.as_deref(),
            required_cols,
            inherited_preds,
        ),
        PlanNode::Union(n) => {
            push_down_fanout(&mut n.children, &[], n.retag_as.as_deref(), required_cols, inherited_preds)
        }
    }
}

fn push_down_fanout(
    children: &mut [PlanNode],
    must_keep: &[String],
    retag_as: Option<&str>,
    required_cols: &[String],
    inherited_preds: &[Predicate],
) {
    let child_required: Vec<String> = match retag_as {
        Some(tag) => {
            let mut v: Vec<String> = required_cols
                .iter()
                .filter_map(|c| {
                    let (q, bare) = split_qualified(c);
                    (q.is_empty() || q == tag).then(|| bare.to_string())
                })
                .collect();
            v.extend(must_keep.iter().cloned());
            v
        }
        None => {
            let mut v = required_cols.to_vec();
            v.extend(must_keep.iter().cloned());
            v
        }
    };
    let child_preds: Vec<Predicate> = match retag_as {
        Some(tag) => preds_for_table(inherited_preds, tag),
        None => inherited_preds.to_vec(),
    };
    for child in children.iter_mut() {
        push_down(child, &child_required, &child_preds);
    }
}

/// True if every leaf reachable from `node` already carries (a
/// column-bare, translated form of) every predicate in `preds` — meaning
/// a wrapping `Selection` for `preds` would be pure overhead at execution
/// time and can be skipped.
fn preds_fully_absorbed(node: &PlanNode, preds: &[Predicate]) -> bool {
    match node {
        PlanNode::ReadTable(rt) => {
            if rt.disabled {
                return true;
            }
            preds_for_table(preds, &rt.orig_logical_table)
                .iter()
                .all(|p| rt.preds.contains(p))
        }
        PlanNode::Union(u) => u.children.iter().all(|c| preds_fully_absorbed(c, preds)),
        PlanNode::NJoin(j) => j.children.iter().all(|c| preds_fully_absorbed(c, preds)),
        PlanNode::Projection(p) => preds_fully_absorbed(&p.child, preds),
        PlanNode::Selection(s) => preds_fully_absorbed(&s.child, preds),
        PlanNode::Rename(r) => preds_fully_absorbed(&r.child, preds),
    }
}

/// The bottom-up trimming pass (§4.3): drops `disabled` subtrees and
/// `skipped` wrapper nodes, and synthesizes a `Rename` wherever a
/// `retag_as` boundary survives, so the logical table name reappears in
/// the header exactly once fragment branches have been collapsed.
pub fn copy(node: &PlanNode) -> Option<PlanNode> {
    match node {
        PlanNode::Projection(p) => {
            if p.disabled {
                return None;
            }
            let child = copy(&p.child)?;
            Some(if p.skipped {
                child
            } else {
                PlanNode::projection(p.cols.clone(), child)
            })
        }
        PlanNode::Selection(s) => {
            if s.disabled {
                return None;
            }
            let child = copy(&s.child)?;
            Some(if s.skipped {
                child
            } else {
                PlanNode::selection(s.preds.clone(), child)
            })
        }
        PlanNode::Rename(r) => {
            if r.disabled {
                return None;
            }
            let child = copy(&r.child)?;
            Some(PlanNode::rename(r.new_table.clone(), child))
        }
        PlanNode::ReadTable(rt) => {
            if rt.disabled {
                None
            } else {
                Some(PlanNode::ReadTable(rt.clone()))
            }
        }
        PlanNode::NJoin(n) => copy_fanout_join(n),
        PlanNode::Union(n) => copy_fanout_union(n),
    }
}

fn copy_fanout_join(n: &NJoinNode) -> Option<PlanNode> {
    if n.disabled {
        return None;
    }
    let mut children = Vec::with_capacity(n.children.len());
    for c in &n.children {
        // An inner join against a fragment with no surviving rows yields
        // no rows at all: the whole join collapses.
        children.push(copy(c)?);
    }
    if children.is_empty() {
        return None;
    }
    let collapsed = if children.len() == 1 {
        children.into_iter().next().unwrap()
    } else {
        PlanNode::njoin(n.join_cols.clone(), children, None)
    };
    Some(match &n.retag_as {
        Some(tag) => PlanNode::rename(tag.clone(), collapsed),
        None => collapsed,
    })
}

fn copy_fanout_union(n: &UnionNode) -> Option<PlanNode> {
    if n.disabled {
        return None;
    }
    let children: Vec<PlanNode> = n.children.iter().filter_map(copy).collect();
    if children.is_empty() {
        return None;
    }
    let collapsed = if children.len() == 1 {
        children.into_iter().next().unwrap()
    } else {
        PlanNode::union(children, None)
    };
    Some(match &n.retag_as {
        Some(tag) => PlanNode::rename(tag.clone(), collapsed),
        None => collapsed,
    })
}

/// The final labeling pass (§4.3): a subtree whose children all execute
/// on the same site can run as one RPC to that site; any mismatch (or a
/// join/union spanning multiple sites) needs the distributed executor and
/// is left unlabeled (`exec_site = None`).
pub fn optimize_exec_node(node: &mut PlanNode) {
    match node {
        PlanNode::Projection(p) => {
            optimize_exec_node(&mut p.child);
            p.exec_site = p.child.exec_site().map(str::to_string);
        }
        PlanNode::Selection(s) => {
            optimize_exec_node(&mut s.child);
            s.exec_site = s.child.exec_site().map(str::to_string);
        }
        PlanNode::Rename(r) => {
            optimize_exec_node(&mut r.child);
            r.exec_site = r.child.exec_site().map(str::to_string);
        }
        PlanNode::ReadTable(rt) => {
            rt.exec_site = Some(rt.site.clone());
        }
        PlanNode::NJoin(n) => {
            for c in &mut n.children {
                optimize_exec_node(c);
            }
            n.exec_site = single_site(&n.children);
        }
        PlanNode::Union(n) => {
            for c in &mut n.children {
                optimize_exec_node(c);
            }
            n.exec_site = single_site(&n.children);
        }
    }
}

fn single_site(children: &[PlanNode]) -> Option<String> {
    let mut sites = children.iter().map(PlanNode::exec_site);
    let first = sites.next()??;
    if sites.all(|s| s == Some(first)) {
        Some(first.to_string())
    } else {
        None
    }
}

/// Qualifies every bare column reference in `cols` by `table`, used to
/// seed the top-level `required_cols` call from a `SelectStmt`'s already
/// fully-qualified `projected_cols` — exposed for callers that need to
/// requalify an intermediate result (e.g. the batch executor's header
/// rewriting).
pub fn requalify(cols: &[String], table: &str) -> Vec<String> {
    cols.iter().map(|c| qualify(table, unqualified(c))).collect()
}

/// The full pipeline (§4.3-4.4): build the raw tree, push columns and
/// predicates to the leaves, trim, and label execution sites.
pub fn optimize(mut node: PlanNode) -> Option<PlanNode> {
    let required_cols: Vec<String> = Vec::new();
    push_down(&mut node, &required_cols, &[]);
    let mut trimmed = copy(&node)?;
    optimize_exec_node(&mut trimmed);
    Some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_distributed_read, build_raw_tree};
    use shardq_catalog::ddl::process_create_meta;
    use shardq_catalog::DatabaseMeta;
    use shardq_sqlfront::SelectStmt;

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

    #[test]
    fn contradictory_range_disables_a_fragment() {
        let db = publisher_db();
        let mut node = build_distributed_read("Publisher", &db).unwrap();
        let preds = vec![Predicate::new(
            "Publisher.id",
            CompareOp::Lt,
            PredRhs::Literal(Value::Int(100)),
        )];
        push_down(&mut node, &["Publisher.id".to_string()], &preds);
        let PlanNode::Union(u) = &node else { panic!("expected union") };
        let disabled: Vec<bool> = u.children.iter().map(PlanNode::disabled).collect();
        // node1.p2 requires id >= 104000, which contradicts id < 100.
        assert!(disabled.iter().any(|d| *d));
        assert!(!disabled.iter().all(|d| *d));
    }

    #[test]
    fn copy_drops_disabled_fragment_and_keeps_the_other() {
        let db = publisher_db();
        let mut node = build_distributed_read("Publisher", &db).unwrap();
        let preds = vec![Predicate::new(
            "Publisher.id",
            CompareOp::Lt,
            PredRhs::Literal(Value::Int(100)),
        )];
        push_down(&mut node, &["Publisher.id".to_string()], &preds);
        let trimmed = copy(&node).unwrap();
        match trimmed {
            PlanNode::Rename(r) => {
                assert_eq!(r.new_table, "Publisher");
                match *r.child {
                    PlanNode::ReadTable(rt) => assert_eq!(rt.site, "node0"),
                    other => panic!("expected a single surviving ReadTable, got {other:?}"),
                }
            }
            other => panic!("expected Rename at the root, got {other:?}"),
        }
    }

    #[test]
    fn full_optimize_labels_a_single_table_scan_with_its_site() {
        let db = publisher_db();
        let stmt = SelectStmt {
            tables: vec!["Publisher".to_string()],
            projected_cols: vec!["Publisher.name".to_string()],
            join_preds: vec![],
            filter_preds: vec![Predicate::new(
                "Publisher.id",
                CompareOp::Lt,
                PredRhs::Literal(Value::Int(100)),
            )],
        };
        let raw = build_raw_tree(&stmt, &db).unwrap();
        let plan = optimize(raw).unwrap();
        assert!(plan.exec_site().is_some());
    }
}
