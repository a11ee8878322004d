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
// The site RPC server: an accept loop that spawns a task per connection
// and never awaits it, so one slow client cannot stall new connections —
// the same shape as `TcpCliEngine::service_loop`/`handle_connection`.

use std::sync::Arc;

use async_trait::async_trait;
use shardq_common::Result;
use tokio::net::TcpListener;

use crate::conn::{recv_request, send_response};
use crate::message::{RpcRequest, RpcResponse};

/// Implemented once per process role: the site process answers all three
/// methods against its local storage engine.
#[async_trait]
pub trait SiteHandler: Send + Sync + 'static {
    async fn exec_sql(&self, sql: &str) -> RpcResponse;
    async fn insert(&self, table: &str, rows: Vec<Vec<shardq_common::Value>>) -> RpcResponse;
    async fn control(&self, cmd: &str) -> RpcResponse;
}

pub async fn serve<H: SiteHandler>(bind_addr: &str, handler: Arc<H>) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(shardq_common::ShardqError::from)?;
    tracing::info!(bind_addr, "site RPC server listening");
    loop {
        let (stream, peer) = listener.accept().await.map_err(shardq_common::ShardqError::from)?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, handler).await {
                tracing::warn!(%peer, error = %e, "RPC connection ended with an error");
            }
        });
    }
}

async fn handle_connection<H: SiteHandler>(mut stream: tokio::net::TcpStream, handler: Arc<H>) -> Result<()> {
    loop {
        let Some(req) = recv_request(&mut stream).await? else {
            return Ok(());
        };
        let resp = match req {
            RpcRequest::ExecSql(sql) => handler.exec_sql(&sql).await,
            RpcRequest::Insert { table, rows } => handler.insert(&table, rows).await,
            RpcRequest::Control(cmd) => handler.control(&cmd).await,
        };
        send_response(&mut stream, &resp).await?;
    }
}
