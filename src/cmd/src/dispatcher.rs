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
// Front-end dispatcher (C8, §4.6): one `Dispatcher` per coordinator
// process, shared across connections; per-connection state is just
// "which database is selected", threaded through explicitly rather than
// stored on the dispatcher, since two clients may have two different
// databases open at once.

use std::path::Path;

use shardq_batch::ExecContext;
use shardq_catalog::Catalog;
use shardq_common::{Result, ShardqError, Value};
use shardq_rpc::RpcRequest;
use shardq_sqlfront::Stmt;

pub struct Dispatcher {
    pub catalog: Catalog,
    pub ctx: ExecContext,
}

fn second_token(line: &str) -> Option<&str> {
    line.split_whitespace().nth(1)
}

fn third_token(line: &str) -> Option<&str> {
    line.split_whitespace().nth(2)
}

fn cell(v: &Value) -> String {
    v.to_string()
}

impl Dispatcher {
    pub fn new(catalog: Catalog, ctx: ExecContext) -> Self {
        Self { catalog, ctx }
    }

    /// Never returns `Err`: failures become the client-visible one-row
    /// error result described by §7.
    pub async fn handle_command(&self, current_db: &mut Option<String>, line: &str) -> Vec<Vec<String>> {
        match self.dispatch(current_db, line).await {
            Ok(rows) => rows,
            Err(e) => vec![vec!["error".to_string()], vec![e.as_client_row()]],
        }
    }

    async fn dispatch(&self, current_db: &mut Option<String>, line: &str) -> Result<Vec<Vec<String>>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(vec![vec!["status".to_string()]]);
        }
        let verb = trimmed.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
        match verb.as_str() {
            "CREATEDB" => {
                let name = second_token(trimmed)
                    .ok_or_else(|| ShardqError::parse("CREATEDB requires a database name"))?;
                self.catalog.add_db(name)?;
                Ok(vec![vec!["status".to_string()], vec!["created".to_string()]])
            }
            "USEDB" => {
                let name = second_token(trimmed).ok_or_else(|| ShardqError::parse("USEDB requires a database name"))?;
                self.catalog.add_db(name)?;
                *current_db = Some(name.to_string());
                Ok(vec![vec!["status".to_string()], vec!["ok".to_string()]])
            }
            "CLOSE" => {
                if let Some(db) = current_db.take() {
                    self.catalog.close_db(&db);
                }
                Ok(vec![vec!["status".to_string()], vec!["closed".to_string()]])
            }
            "CREATETABLE" => {
                let db_name = current_db
                    .clone()
                    .ok_or_else(|| ShardqError::catalog("no database selected"))?;
                let def = trimmed["CREATETABLE".len()..].trim();
                let site_ddl = self.catalog.create_table(&db_name, def)?;
                for (site, sql) in site_ddl {
                    let addr = self.ctx.addr_of(&site)?.to_string();
                    let resp = self.ctx.rpc.call(&site, &addr, &RpcRequest::Control(sql)).await?;
                    resp.into_result()?;
                }
                Ok(vec![vec!["status".to_string()], vec!["created".to_string()]])
            }
            "IMPORT" => {
                let db_name = current_db
                    .clone()
                    .ok_or_else(|| ShardqError::catalog("no database selected"))?;
                let table = second_token(trimmed).ok_or_else(|| ShardqError::parse("IMPORT requires a table name"))?;
                let path = third_token(trimmed).ok_or_else(|| ShardqError::parse("IMPORT requires a file path"))?;
                let snapshot = self.catalog.snapshot(&db_name)?;
                let insert = shardq_batch::insert_from_tsv(table, Path::new(path), &snapshot)?;
                let n = shardq_batch::insert_to_sites(&insert, &snapshot, &self.ctx).await?;
                Ok(vec![vec!["status".to_string()], vec![format!("imported {n} rows")]])
            }
            _ => self.dispatch_sql(current_db, trimmed).await,
        }
    }

    async fn dispatch_sql(&self, current_db: &Option<String>, sql: &str) -> Result<Vec<Vec<String>>> {
        let db_name = current_db
            .clone()
            .ok_or_else(|| ShardqError::catalog("no database selected"))?;
        let snapshot = self.catalog.snapshot(&db_name)?;
        match shardq_sqlfront::parse_statement(sql, &snapshot)? {
            Stmt::Select(select) => match shardq_plan::plan_select(&select, &snapshot)? {
                Some(plan) => {
                    let frame = shardq_batch::execute(&plan, &snapshot, &self.ctx).await?;
                    let mut out = vec![frame.header];
                    out.extend(frame.rows.iter().map(|row| row.iter().map(cell).collect()));
                    Ok(out)
                }
                None => Ok(vec![select.projected_cols]),
            },
            Stmt::Insert(insert) => {
                let n = shardq_batch::insert_to_sites(&insert, &snapshot, &self.ctx).await?;
                Ok(vec![vec!["status".to_string()], vec![format!("inserted {n} rows")]])
            }
            Stmt::Delete(delete) => {
                shardq_batch::delete_from_sites(&delete, &snapshot, &self.ctx).await?;
                Ok(vec![vec!["status".to_string()], vec!["deleted".to_string()]])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_token_extracts_the_argument() {
        assert_eq!(second_token("USEDB demo"), Some("demo"));
        assert_eq!(second_token("USEDB"), None);
    }

    #[test]
    fn third_token_extracts_the_import_path() {
        assert_eq!(third_token("IMPORT Publisher /tmp/publisher.tsv"), Some("/tmp/publisher.tsv"));
        assert_eq!(third_token("IMPORT Publisher"), None);
    }
}
