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
// The client-facing line protocol (§6), grounded on `tcpcli-engine.hh`:
// one accepted command per line in, and a reply framed as a `u32`
// byte-count prefix followed by a tab-separated body — one line per
// result row, a header row first, closed with `DONE TOTAL <n> LINES\n`
// where `n` excludes the header.

use std::sync::Arc;

use shardq_common::{Result, ShardqError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use crate::dispatcher::Dispatcher;
use shardq_rpc::wire::write_u32;

fn render(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        for cell in row {
            out.push_str(cell);
            out.push('\t');
        }
        out.push('\n');
    }
    out.push_str(&format!("DONE TOTAL {} LINES\n", rows.len().saturating_sub(1)));
    out
}

pub async fn serve(bind_addr: &str, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await.map_err(ShardqError::from)?;
    tracing::info!(bind_addr, "client CLI server listening");
    loop {
        let (stream, peer) = listener.accept().await.map_err(ShardqError::from)?;
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, dispatcher).await {
                tracing::warn!(%peer, error = %e, "CLI connection ended with an error");
            }
        });
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut current_db: Option<String> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await.map_err(ShardqError::from)?;
        if n == 0 {
            return Ok(());
        }
        let rows = dispatcher.handle_command(&mut current_db, &line).await;
        let body = render(&rows);
        write_u32(&mut write_half, body.len() as u32).await?;
        write_half.write_all(body.as_bytes()).await.map_err(ShardqError::from)?;
        write_half.flush().await.map_err(ShardqError::from)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_counts_data_rows_excluding_the_header() {
        let rows = vec![vec!["name".to_string()], vec!["alice".to_string()], vec!["bob".to_string()]];
        let body = render(&rows);
        assert!(body.ends_with("DONE TOTAL 2 LINES\n"));
        assert!(body.starts_with("name\t\n"));
    }
}
