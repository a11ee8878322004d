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
// The three site RPC methods of §4.7/§6: `exec_sql` runs a site-local SQL
// string and returns its rows as a header row followed by data rows (all
// stringified, like the original's `vector<vector<string>>`); `insert`
// appends pre-built rows to a site-local fragment table; `control` carries
// catalog/DDL administration (`createtable`, `close`, …).

use shardq_common::{Result, ShardqError, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::wire::{read_i64, read_row_vec, read_string, read_u32, write_i64, write_row_vec, write_string, write_u32};

const METHOD_SQL_EXEC: u32 = 1;
const METHOD_INSERT: u32 = 2;
const METHOD_CONTROL: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    ExecSql(String),
    Insert { table: String, rows: Vec<Vec<Value>> },
    Control(String),
}

impl RpcRequest {
    pub async fn write<W: AsyncWriteExt + Unpin>(&self, out: &mut W) -> Result<()> {
        match self {
            RpcRequest::ExecSql(sql) => {
                write_u32(out, METHOD_SQL_EXEC).await?;
                write_string(out, sql).await
            }
            RpcRequest::Insert { table, rows } => {
                write_u32(out, METHOD_INSERT).await?;
                write_string(out, table).await?;
                write_u32(out, rows.len() as u32).await?;
                for row in rows {
                    write_u32(out, row.len() as u32).await?;
                    for v in row {
                        write_value(out, v).await?;
                    }
                }
                Ok(())
            }
            RpcRequest::Control(cmd) => {
                write_u32(out, METHOD_CONTROL).await?;
                write_string(out, cmd).await
            }
        }
    }

    pub async fn read<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<Self> {
        let method = read_u32(input).await?;
        match method {
            METHOD_SQL_EXEC => Ok(RpcRequest::ExecSql(read_string(input).await?)),
            METHOD_INSERT => {
                let table = read_string(input).await?;
                let nrows = read_u32(input).await? as usize;
                let mut rows = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    let ncols = read_u32(input).await? as usize;
                    let mut row = Vec::with_capacity(ncols);
                    for _ in 0..ncols {
                        row.push(read_value(input).await?);
                    }
                    rows.push(row);
                }
                Ok(RpcRequest::Insert { table, rows })
            }
            METHOD_CONTROL => Ok(RpcRequest::Control(read_string(input).await?)),
            other => Err(ShardqError::internal(format!("unknown RPC method id {other}"))),
        }
    }
}

async fn write_value<W: AsyncWriteExt + Unpin>(out: &mut W, v: &Value) -> Result<()> {
    match v {
        Value::Int(i) => {
            write_u32(out, 0).await?;
            write_i64(out, *i).await
        }
        Value::Str(s) => {
            write_u32(out, 1).await?;
            write_string(out, s).await
        }
    }
}

async fn read_value<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<Value> {
    match read_u32(input).await? {
        0 => Ok(Value::Int(read_i64(input).await?)),
        1 => Ok(Value::Str(read_string(input).await?)),
        other => Err(ShardqError::internal(format!("unknown value tag {other}"))),
    }
}

/// `Ok` rows (header row then data rows) or an error message, mirroring
/// the site returning `{{e.what()}}` as a one-row result on exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse(pub std::result::Result<Vec<Vec<String>>, String>);

impl RpcResponse {
    pub fn ok(rows: Vec<Vec<String>>) -> Self {
        Self(Ok(rows))
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self(Err(msg.into()))
    }

    pub async fn write<W: AsyncWriteExt + Unpin>(&self, out: &mut W) -> Result<()> {
        match &self.0 {
            Ok(rows) => {
                write_u32(out, 0).await?;
                write_row_vec(out, rows).await
            }
            Err(msg) => {
                write_u32(out, 1).await?;
                write_string(out, msg).await
            }
        }
    }

    pub async fn read<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<Self> {
        match read_u32(input).await? {
            0 => Ok(RpcResponse(Ok(read_row_vec(input).await?))),
            1 => Ok(RpcResponse(Err(read_string(input).await?))),
            other => Err(ShardqError::internal(format!("unknown response tag {other}"))),
        }
    }

    pub fn into_result(self) -> Result<Vec<Vec<String>>> {
        self.0.map_err(ShardqError::Remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_sql_request_round_trips() {
        let req = RpcRequest::ExecSql("SELECT * FROM p1".to_string());
        let mut buf = Vec::new();
        req.write(&mut buf).await.unwrap();
        let mut cur = std::io::Cursor::new(buf);
        assert_eq!(RpcRequest::read(&mut cur).await.unwrap(), req);
    }

    #[tokio::test]
    async fn insert_request_round_trips_mixed_values() {
        let req = RpcRequest::Insert {
            table: "c1".to_string(),
            rows: vec![vec![Value::Int(1), Value::Str("alice".to_string())]],
        };
        let mut buf = Vec::new();
        req.write(&mut buf).await.unwrap();
        let mut cur = std::io::Cursor::new(buf);
        assert_eq!(RpcRequest::read(&mut cur).await.unwrap(), req);
    }

    #[tokio::test]
    async fn error_response_round_trips() {
        let resp = RpcResponse::err("no such table");
        let mut buf = Vec::new();
        resp.write(&mut buf).await.unwrap();
        let mut cur = std::io::Cursor::new(buf);
        let back = RpcResponse::read(&mut cur).await.unwrap();
        assert_eq!(back.into_result().unwrap_err().to_string(), "no such table");
    }
}
