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

use std::collections::HashMap;

use shardq_common::{Result, ShardqError};
use shardq_rpc::SiteClientPool;

/// Shared state threaded through one query's distributed execution: the
/// pooled site connections and the static `site -> host:port` table out
/// of `ClusterConfig`.
#[derive(Clone)]
pub struct ExecContext {
    pub rpc: SiteClientPool,
    pub site_addrs: HashMap<String, String>,
}

impl ExecContext {
    pub fn new(site_addrs: HashMap<String, String>) -> Self {
        Self {
            rpc: SiteClientPool::new(),
            site_addrs,
        }
    }

    pub fn addr_of(&self, site: &str) -> Result<&str> {
        self.site_addrs
            .get(site)
            .map(String::as_str)
            .ok_or_else(|| ShardqError::catalog(format!("unknown site '{site}'")))
    }
}
