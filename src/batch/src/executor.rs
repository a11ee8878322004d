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
// Distributed executor (C5, §4.4): walks the optimized plan tree bottom
// up, fanning out `Union`/`NJoin` children concurrently. A `Frame` is the
// executor's unit of data in flight — a header of qualified column names
// alongside its rows — analogous to a batch of `DataChunk`s in the
// teacher, simplified to a plain row-major `Vec<Vec<Value>>` since this
// system has no vectorized execution layer.

use std::collections::{HashMap, HashSet};

use futures::future::try_join_all;
use shardq_catalog::DatabaseMeta;
use shardq_common::{qualify, unqualified, CompareOp, PredRhs, Predicate, Result, ShardqError, Value};
use shardq_plan::node::{NJoinNode, ReadTableNode, SelectionNode, UnionNode};
use shardq_plan::PlanNode;
use shardq_rpc::RpcRequest;

use crate::context::ExecContext;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn find_col(header: &[String], name: &str) -> Result<usize> {
    let want = unqualified(name);
    header
        .iter()
        .position(|h| unqualified(h) == want)
        .ok_or_else(|| ShardqError::internal(format!("column '{name}' not present in header {header:?}")))
}

fn op_str(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

fn render_pred(p: &Predicate) -> String {
    match &p.right {
        PredRhs::Literal(Value::Int(i)) => format!("{} {} {}", p.left, op_str(p.op), i),
        PredRhs::Literal(Value::Str(s)) => {
            format!("{} {} '{}'", p.left, op_str(p.op), s.replace('\'', "''"))
        }
        PredRhs::Column(c) => format!("{} {} {}", p.left, op_str(p.op), c),
    }
}

pub async fn execute(node: &PlanNode, db: &DatabaseMeta, ctx: &ExecContext) -> Result<Frame> {
    match node {
        PlanNode::ReadTable(rt) => exec_read_table(rt, db, ctx).await,
        PlanNode::Projection(p) => {
            let child = execute(&p.child, db, ctx).await?;
            project(child, &p.cols)
        }
        PlanNode::Selection(s) => {
            let child = execute(&s.child, db, ctx).await?;
            select(child, s)
        }
        PlanNode::Rename(r) => {
            let mut child = execute(&r.child, db, ctx).await?;
            child.header = child.header.iter().map(|h| qualify(&r.new_table, unqualified(h))).collect();
            Ok(child)
        }
        PlanNode::Union(u) => exec_union(u, db, ctx).await,
        PlanNode::NJoin(j) => exec_njoin(j, db, ctx).await,
    }
}

async fn exec_read_table(rt: &ReadTableNode, db: &DatabaseMeta, ctx: &ExecContext) -> Result<Frame> {
    let table = db
        .tables
        .get(&rt.orig_logical_table)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table '{}'", rt.orig_logical_table)))?;

    let col_list = rt.cols.join(", ");
    let where_clause = if rt.preds.is_empty() {
        String::new()
    } else {
        format!(
            " WHERE {}",
            rt.preds.iter().map(render_pred).collect::<Vec<_>>().join(" AND ")
        )
    };
    let sql = format!("SELECT {col_list} FROM {} {where_clause}", rt.frag);
    let addr = ctx.addr_of(&rt.site)?;
    let resp = ctx.rpc.call(&rt.site, addr, &RpcRequest::ExecSql(sql)).await?;
    let raw_rows = resp.into_result()?;

    let header: Vec<String> = rt.cols.iter().map(|c| qualify(&rt.orig_logical_table, c)).collect();
    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw_row in raw_rows {
        if raw_row.len() != rt.cols.len() {
            return Err(ShardqError::Remote(format!(
                "site {} returned {} columns for a {}-column request",
                rt.site,
                raw_row.len(),
                rt.cols.len()
            )));
        }
        let mut row = Vec::with_capacity(raw_row.len());
        for (cell, col) in raw_row.into_iter().zip(rt.cols.iter()) {
            let ty = table.column_type.get(col).copied().unwrap_or(shardq_common::ColumnType::Str);
            row.push(Value::parse_typed(&cell, ty));
        }
        rows.push(row);
    }
    Ok(Frame { header, rows })
}

fn project(child: Frame, cols: &[String]) -> Result<Frame> {
    let idxs: Vec<usize> = cols.iter().map(|c| find_col(&child.header, c)).collect::<Result<_>>()?;
    let header = idxs.iter().map(|&i| child.header[i].clone()).collect();
    let rows = child
        .rows
        .into_iter()
        .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Ok(Frame { header, rows })
}

fn select(child: Frame, s: &SelectionNode) -> Result<Frame> {
    let checks: Vec<(usize, CompareOp, PredRhs)> = s
        .preds
        .iter()
        .map(|p| find_col(&child.header, &p.left).map(|i| (i, p.op, p.right.clone())))
        .collect::<Result<_>>()?;
    let rows = child
        .rows
        .into_iter()
        .filter(|row| {
            checks.iter().all(|(idx, op, rhs)| {
                let lhs = &row[*idx];
                let ord = match rhs {
                    PredRhs::Literal(v) => lhs.compare_var(v),
                    PredRhs::Column(c) => match find_col(&child.header, c) {
                        Ok(ridx) => lhs.compare_var(&row[ridx]),
                        Err(_) => return false,
                    },
                };
                op.eval(ord)
            })
        })
        .collect();
    Ok(Frame { header: child.header, rows })
}

async fn exec_union(u: &UnionNode, db: &DatabaseMeta, ctx: &ExecContext) -> Result<Frame> {
    let frames = try_join_all(u.children.iter().map(|c| execute(c, db, ctx))).await?;
    let header = frames
        .first()
        .map(|f| f.header.clone())
        .ok_or_else(|| ShardqError::internal("Union with no children"))?;
    let mut rows = Vec::new();
    for f in frames {
        rows.extend(f.rows);
    }
    Ok(Frame { header, rows })
}

/// The n-ary join's key column name for child `i`: broadcast from a
/// single shared name (the V-fragment case) or taken positionally (the
/// cross-table join-spanning-tree case), per `NJoinNode::join_cols`.
fn key_for(join_cols: &[String], i: usize) -> &str {
    if join_cols.len() == 1 {
        &join_cols[0]
    } else {
        &join_cols[i]
    }
}

/// Cartesian-product multi-way join on `join_cols` (§4.4, Open Question
/// #3): the driver (first child) is deduplicated by key before being
/// crossed with the remaining children, so a driver side carrying
/// duplicate keys (e.g. a self-referencing V-fragment) contributes each
/// distinct key only once rather than multiplying the result.
async fn exec_njoin(j: &NJoinNode, db: &DatabaseMeta, ctx: &ExecContext) -> Result<Frame> {
    let mut frames = try_join_all(j.children.iter().map(|c| execute(c, db, ctx))).await?;
    if frames.is_empty() {
        return Err(ShardqError::internal("NJoin with no children"));
    }
    let mut iter = frames.drain(..);
    let driver = iter.next().unwrap();
    let driver_key_idx = find_col(&driver.header, key_for(&j.join_cols, 0))?;

    let mut seen: HashSet<Value> = HashSet::new();
    let mut acc_header = driver.header;
    let mut acc_rows: Vec<Vec<Value>> = Vec::new();
    for row in driver.rows {
        if seen.insert(row[driver_key_idx].clone()) {
            acc_rows.push(row);
        }
    }

    for (i, frame) in iter.enumerate() {
        let key_name = key_for(&j.join_cols, i + 1);
        let frame_key_idx = find_col(&frame.header, key_name)?;

        let mut groups: HashMap<Value, Vec<Vec<Value>>> = HashMap::new();
        for mut row in frame.rows {
            let key = row[frame_key_idx].clone();
            row.remove(frame_key_idx);
            groups.entry(key).or_default().push(row);
        }

        let mut new_rows = Vec::new();
        for arow in &acc_rows {
            if let Some(matches) = groups.get(&arow[driver_key_idx]) {
                for mrow in matches {
                    let mut combined = arow.clone();
                    combined.extend(mrow.clone());
                    new_rows.push(combined);
                }
            }
        }
        acc_rows = new_rows;
        let mut child_header = frame.header;
        child_header.remove(frame_key_idx);
        acc_header.extend(child_header);
    }

    Ok(Frame {
        header: acc_header,
        rows: acc_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(header: &[&str], rows: Vec<Vec<Value>>) -> Frame {
        Frame {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn projection_reorders_and_subsets_columns() {
        let f = frame(
            &["T.a", "T.b", "T.c"],
            vec![vec![Value::Int(1), Value::Int(2), Value::Int(3)]],
        );
        let out = project(f, &["T.c".to_string(), "T.a".to_string()]).unwrap();
        assert_eq!(out.header, vec!["T.c", "T.a"]);
        assert_eq!(out.rows[0], vec![Value::Int(3), Value::Int(1)]);
    }

    #[test]
    fn selection_filters_by_literal_predicate() {
        let f = frame(
            &["T.id"],
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
        );
        let s = SelectionNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            preds: vec![Predicate::new(
                "T.id",
                CompareOp::Gt,
                PredRhs::Literal(Value::Int(1)),
            )],
            child: Box::new(PlanNode::read_table("s", "f", "T", vec!["id".to_string()], vec![])),
        };
        let out = select(f, &s).unwrap();
        assert_eq!(out.rows.len(), 2);
    }

    #[test]
    fn key_for_broadcasts_a_single_join_column_to_every_child() {
        assert_eq!(key_for(&["id".to_string()], 0), "id");
        assert_eq!(key_for(&["id".to_string()], 3), "id");
    }
}
