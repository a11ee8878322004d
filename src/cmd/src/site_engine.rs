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
// The site process's local storage engine: one bundled `rusqlite`
// connection per site, hosting whatever fragments the coordinator has
// told it (via `control`) to create. Blocking rusqlite calls are pushed
// onto `spawn_blocking` so a slow query never stalls the async RPC
// accept loop.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use shardq_common::Value;
use shardq_rpc::{RpcResponse, SiteHandler};

pub struct SiteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl SiteEngine {
    pub fn open(db_path: &Path, init_script: Option<&str>) -> shardq_common::Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| shardq_common::ShardqError::internal(format!("opening site database: {e}")))?;
        if let Some(script) = init_script {
            conn.execute_batch(script)
                .map_err(|e| shardq_common::ShardqError::internal(format!("running init script: {e}")))?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn is_select(sql: &str) -> bool {
        sql.trim_start().get(0..6).map(|s| s.eq_ignore_ascii_case("select")).unwrap_or(false)
    }
}

fn cell_to_string(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(_) => String::new(),
    }
}

fn run_select(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(sql)?;
    let ncols = stmt.column_count();
    let rows = stmt.query_map([], move |row| {
        (0..ncols).map(|i| row.get_ref(i).map(cell_to_string)).collect::<rusqlite::Result<Vec<_>>>()
    })?;
    rows.collect()
}

fn run_batch(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    conn.execute_batch(sql)
}

fn run_insert(conn: &mut Connection, table: &str, rows: Vec<Vec<Value>>) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for row in rows {
        let placeholders = vec!["?"; row.len()].join(", ");
        let sql = format!("INSERT INTO {table} VALUES ({placeholders})");
        let params: Vec<SqlValue> = row
            .into_iter()
            .map(|v| match v {
                Value::Int(i) => SqlValue::Integer(i),
                Value::Str(s) => SqlValue::Text(s),
            })
            .collect();
        tx.execute(&sql, rusqlite::params_from_iter(params))?;
    }
    tx.commit()
}

#[async_trait]
impl SiteHandler for SiteEngine {
    async fn exec_sql(&self, sql: &str) -> RpcResponse {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let select = Self::is_select(&sql);
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("site database mutex poisoned");
            if select {
                run_select(&conn, &sql).map_err(|e| e.to_string())
            } else {
                run_batch(&conn, &sql).map(|_| Vec::new()).map_err(|e| e.to_string())
            }
        })
        .await;
        match result {
            Ok(Ok(rows)) => RpcResponse::ok(rows),
            Ok(Err(msg)) => RpcResponse::err(msg),
            Err(join_err) => RpcResponse::err(join_err.to_string()),
        }
    }

    async fn insert(&self, table: &str, rows: Vec<Vec<Value>>) -> RpcResponse {
        let conn = self.conn.clone();
        let table = table.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("site database mutex poisoned");
            run_insert(&mut conn, &table, rows).map_err(|e| e.to_string())
        })
        .await;
        match result {
            Ok(Ok(())) => RpcResponse::ok(Vec::new()),
            Ok(Err(msg)) => RpcResponse::err(msg),
            Err(join_err) => RpcResponse::err(join_err.to_string()),
        }
    }

    async fn control(&self, cmd: &str) -> RpcResponse {
        self.exec_sql(cmd).await
    }
}
