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
// A small connection pool keyed by site name, in the spirit of
// `ComputeClientPool` (`compute_client_pool.rs`): get-or-connect, and drop
// a client that faults so the next call reconnects. Unlike the teacher's
// pool, the key space here is the fixed, small site list out of
// `ClusterConfig` rather than an evictable cache over a dynamic compute
// node set, so a plain mutex-guarded map is enough — no need for an LRU
// cache crate.

use std::collections::HashMap;
use std::sync::Arc;

use shardq_common::{Result, ShardqError};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::conn::send_request;
use crate::message::{RpcRequest, RpcResponse};

pub struct SiteClient {
    stream: Mutex<TcpStream>,
}

impl SiteClient {
    async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ShardqError::Connection { site: format!("{addr}: {e}") })?;
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    pub async fn call(&self, req: &RpcRequest) -> Result<RpcResponse> {
        let mut stream = self.stream.lock().await;
        send_request(&mut stream, req).await
    }
}

#[derive(Clone, Default)]
pub struct SiteClientPool {
    clients: Arc<Mutex<HashMap<String, Arc<SiteClient>>>>,
}

impl SiteClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, site: &str, addr: &str) -> Result<Arc<SiteClient>> {
        {
            let clients = self.clients.lock().await;
            if let Some(c) = clients.get(site) {
                return Ok(c.clone());
            }
        }
        let client = Arc::new(SiteClient::connect(addr).await?);
        self.clients.lock().await.insert(site.to_string(), client.clone());
        Ok(client)
    }

    /// Drops a faulted client so the next `get` reconnects. Per §4.6's
    /// connection error handling, a call that fails this way is reported
    /// to its caller but does not tear down the rest of the cluster.
    pub async fn evict(&self, site: &str) {
        self.clients.lock().await.remove(site);
    }

    /// Runs `req` against `site`, reconnecting once on a connection
    /// error before giving up.
    pub async fn call(&self, site: &str, addr: &str, req: &RpcRequest) -> Result<RpcResponse> {
        let client = self.get(site, addr).await?;
        match client.call(req).await {
            Ok(resp) => Ok(resp),
            Err(ShardqError::Connection { site: detail }) => {
                tracing::warn!(site, detail, "site connection faulted, reconnecting");
                self.evict(site).await;
                let client = self.get(site, addr).await?;
                client.call(req).await
            }
            Err(e) => Err(e),
        }
    }
}
