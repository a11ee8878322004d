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
// Insert router (C6, §4.5): a V-fragmented table sends every row to every
// fragment, projected down to that fragment's column subset; an
// H-fragmented table routes each row to the first fragment (in a fixed,
// site-name-sorted order — the DDL's own declaration order is not
// preserved by `HashMap`, and the original's iteration order here was
// itself unspecified, so a deterministic tie-break is a strict
// improvement) whose predicate it satisfies. Validated in two passes —
// route everything first, send second — so a routing failure never
// leaves a partial insert spread across sites.

use std::collections::HashMap;
use std::path::Path;

use futures::future::try_join_all;
use shardq_catalog::{DatabaseMeta, FragType, TableMeta};
use shardq_common::{CompareOp, ColumnType, PredRhs, Predicate, Result, ShardqError, Value};
use shardq_rpc::RpcRequest;
use shardq_sqlfront::InsertStmt;

use crate::context::ExecContext;

/// Builds an `InsertStmt` by reading a tab-separated file, per §4.5's
/// `insert_from_tsv`: columns are the catalog's own declared order, each
/// cell is parsed per that column's declared type, and a line with the
/// wrong number of tab-separated fields is not rejected — it is padded
/// out to an all-empty-value row instead, mirroring the original's
/// unchecked positional field access past a short line.
pub fn insert_from_tsv(table: &str, path: &Path, db: &DatabaseMeta) -> Result<InsertStmt> {
    let meta: &TableMeta = db
        .tables
        .get(table)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table '{table}'")))?;
    let cols = meta.columns.clone();

    let text =
        std::fs::read_to_string(path).map_err(|e| ShardqError::parse(format!("reading '{}': {e}", path.display())))?;

    let mut rows = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        let row = if cells.len() == cols.len() {
            cells
                .iter()
                .zip(&cols)
                .map(|(cell, col)| Value::parse_typed(cell, col_type(meta, col)))
                .collect()
        } else {
            cols.iter().map(|col| Value::parse_typed("", col_type(meta, col))).collect()
        };
        rows.push(row);
    }

    Ok(InsertStmt {
        table: table.to_string(),
        cols,
        rows,
    })
}

fn col_type(meta: &TableMeta, col: &str) -> ColumnType {
    meta.column_type.get(col).copied().unwrap_or(ColumnType::Str)
}

fn col_index(cols: &[String], name: &str) -> Option<usize> {
    cols.iter().position(|c| c == name)
}

fn eval_pred(pred: &Predicate, row_cols: &[String], row: &[Value]) -> Result<bool> {
    let idx = col_index(row_cols, &pred.left).ok_or_else(|| {
        ShardqError::parse(format!(
            "insert does not specify column '{}' needed to route this row",
            pred.left
        ))
    })?;
    let ord = match &pred.right {
        PredRhs::Literal(v) => row[idx].compare_var(v),
        PredRhs::Column(c) => {
            let ridx = col_index(row_cols, c).ok_or_else(|| {
                ShardqError::parse(format!("insert does not specify column '{c}' needed to route this row"))
            })?;
            row[idx].compare_var(&row[ridx])
        }
    };
    Ok(pred.op.eval(ord))
}

fn matches_all(preds: &[Predicate], row_cols: &[String], row: &[Value]) -> Result<bool> {
    for p in preds {
        if !eval_pred(p, row_cols, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn insert_to_sites(stmt: &InsertStmt, db: &DatabaseMeta, ctx: &ExecContext) -> Result<usize> {
    let table: &TableMeta = db
        .tables
        .get(&stmt.table)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table '{}'", stmt.table)))?;

    match table.frag_type {
        FragType::Vfrag => insert_vfrag(stmt, table, ctx).await,
        FragType::Hfrag => insert_hfrag(stmt, table, ctx).await,
    }
}

async fn insert_vfrag(stmt: &InsertStmt, table: &TableMeta, ctx: &ExecContext) -> Result<usize> {
    let mut sites: Vec<&String> = table.vfrag.keys().collect();
    sites.sort();

    let mut calls = Vec::with_capacity(sites.len());
    for site in sites {
        let frag = &table.vfrag[site];
        let idxs: Vec<usize> = frag
            .columns
            .iter()
            .map(|c| {
                col_index(&stmt.cols, c).ok_or_else(|| {
                    ShardqError::parse(format!(
                        "insert into V-fragmented table '{}' must specify column '{c}'",
                        table.name
                    ))
                })
            })
            .collect::<Result<_>>()?;
        let rows: Vec<Vec<Value>> = stmt
            .rows
            .iter()
            .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
            .collect();
        let addr = ctx.addr_of(site)?.to_string();
        calls.push(send_insert(ctx, site.clone(), addr, frag.frag_name.clone(), rows));
    }
    try_join_all(calls).await?;
    Ok(stmt.rows.len())
}

async fn insert_hfrag(stmt: &InsertStmt, table: &TableMeta, ctx: &ExecContext) -> Result<usize> {
    let mut sites: Vec<&String> = table.hfrag.keys().collect();
    sites.sort();

    let mut buckets: HashMap<&str, Vec<Vec<Value>>> = HashMap::new();
    for row in &stmt.rows {
        let mut routed = false;
        for site in &sites {
            let frag = &table.hfrag[*site];
            if matches_all(&frag.preds, &stmt.cols, row)? {
                buckets.entry(site.as_str()).or_default().push(row.clone());
                routed = true;
                break;
            }
        }
        if !routed {
            return Err(ShardqError::parse(format!(
                "row does not satisfy any H-fragment predicate for table '{}'",
                table.name
            )));
        }
    }

    let mut calls = Vec::new();
    for site in sites {
        let Some(rows) = buckets.remove(site.as_str()) else {
            continue;
        };
        let frag_name = table.hfrag[site].frag_name.clone();
        let addr = ctx.addr_of(site)?.to_string();
        calls.push(send_insert(ctx, site.clone(), addr, frag_name, rows));
    }
    try_join_all(calls).await?;
    Ok(stmt.rows.len())
}

async fn send_insert(
    ctx: &ExecContext,
    site: String,
    addr: String,
    table: String,
    rows: Vec<Vec<Value>>,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let resp = ctx.rpc.call(&site, &addr, &RpcRequest::Insert { table, rows }).await?;
    resp.into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardq_catalog::ddl::process_create_meta;

    fn hfrag_db() -> DatabaseMeta {
        let mut db = DatabaseMeta::default();
        for line in [
            "CREATEMETA T Publisher ON HFRAG WHERE id:int name:str",
            "CREATEMETA H node0.p1 ON Publisher WHERE id < 100",
            "CREATEMETA H node1.p2 ON Publisher WHERE id >= 100",
        ] {
            assert!(process_create_meta(line, &mut db));
        }
        db
    }

    #[test]
    fn matches_all_rejects_row_missing_a_routing_column() {
        let preds = vec![Predicate::new("id", CompareOp::Lt, PredRhs::Literal(Value::Int(100)))];
        let err = matches_all(&preds, &["name".to_string()], &[Value::Str("x".into())]).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn matches_all_evaluates_a_satisfied_predicate() {
        let db = hfrag_db();
        let table = &db.tables["Publisher"];
        let frag = &table.hfrag["node0"];
        let cols = vec!["id".to_string(), "name".to_string()];
        let row = vec![Value::Int(5), Value::Str("acme".into())];
        assert!(matches_all(&frag.preds, &cols, &row).unwrap());
        let row2 = vec![Value::Int(500), Value::Str("acme".into())];
        assert!(!matches_all(&frag.preds, &cols, &row2).unwrap());
    }

    #[test]
    fn insert_from_tsv_types_cells_and_pads_short_lines() {
        let db = hfrag_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publisher.tsv");
        std::fs::write(&path, "1\tacme\n2\n").unwrap();

        let stmt = insert_from_tsv("Publisher", &path, &db).unwrap();
        assert_eq!(stmt.cols, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(stmt.rows.len(), 2);
        assert_eq!(stmt.rows[0], vec![Value::Int(1), Value::Str("acme".to_string())]);
        assert_eq!(stmt.rows[1], vec![Value::Int(0), Value::Str(String::new())]);
    }
}
