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
// `DELETE` (supplements the distilled spec, see `shardq_sqlfront::stmt`):
// fanned out, unpruned, to every fragment of the table, each with its own
// copy of the filter predicates translated to bare column names.

use futures::future::try_join_all;
use shardq_catalog::{DatabaseMeta, FragType, TableMeta};
use shardq_common::{unqualified, CompareOp, PredRhs, Predicate, Result, ShardqError, Value};
use shardq_rpc::RpcRequest;
use shardq_sqlfront::DeleteStmt;

use crate::context::ExecContext;

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
    let left = unqualified(&p.left);
    match &p.right {
        PredRhs::Literal(Value::Int(i)) => format!("{left} {} {i}", op_str(p.op)),
        PredRhs::Literal(Value::Str(s)) => format!("{left} {} '{}'", op_str(p.op), s.replace('\'', "''")),
        PredRhs::Column(c) => format!("{left} {} {}", op_str(p.op), unqualified(c)),
    }
}

pub async fn delete_from_sites(stmt: &DeleteStmt, db: &DatabaseMeta, ctx: &ExecContext) -> Result<()> {
    let table: &TableMeta = db
        .tables
        .get(&stmt.table)
        .ok_or_else(|| ShardqError::catalog(format!("unknown table '{}'", stmt.table)))?;

    let where_clause = if stmt.filter_preds.is_empty() {
        String::new()
    } else {
        format!(
            " WHERE {}",
            stmt.filter_preds.iter().map(render_pred).collect::<Vec<_>>().join(" AND ")
        )
    };

    let frags: Vec<(String, String)> = match table.frag_type {
        FragType::Hfrag => table
            .hfrag
            .iter()
            .map(|(site, frag)| (site.clone(), frag.frag_name.clone()))
            .collect(),
        FragType::Vfrag => table
            .vfrag
            .iter()
            .map(|(site, frag)| (site.clone(), frag.frag_name.clone()))
            .collect(),
    };

    let mut calls = Vec::with_capacity(frags.len());
    for (site, frag_name) in frags {
        let addr = ctx.addr_of(&site)?.to_string();
        let sql = format!("DELETE FROM {frag_name}{where_clause}");
        calls.push(async move {
            let resp = ctx.rpc.call(&site, &addr, &RpcRequest::ExecSql(sql)).await?;
            resp.into_result()?;
            Result::Ok(())
        });
    }
    try_join_all(calls).await?;
    Ok(())
}
