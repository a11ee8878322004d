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
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ShardqError};

/// `{host, port, cli-port}` for one cluster member, per §6.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "cli-port")]
    pub cli_port: u16,
}

/// The key-value document named in §6: this node's identity, every node's
/// address, and the coordinator's own metadata store location.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub nodes: HashMap<String, NodeConfig>,
    #[serde(rename = "sqldb-filename", default)]
    pub sqldb_filename: Option<String>,
    #[serde(rename = "sqldb-initfile", default)]
    pub sqldb_initfile: Option<String>,
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShardqError::internal(format!("reading config: {e}")))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ShardqError::internal(format!("config: {e}")))
    }

    pub fn this_node(&self) -> Result<&NodeConfig> {
        self.nodes
            .get(&self.name)
            .ok_or_else(|| ShardqError::internal(format!("unknown node {}", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let doc = r#"
name: node0
nodes:
  node0:
    host: 127.0.0.1
    port: 9001
    cli-port: 9101
  node1:
    host: 127.0.0.1
    port: 9002
    cli-port: 9102
sqldb-filename: meta.db
"#;
        let cfg = ClusterConfig::parse(doc).unwrap();
        assert_eq!(cfg.name, "node0");
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.this_node().unwrap().port, 9001);
        assert_eq!(cfg.sqldb_filename.as_deref(), Some("meta.db"));
    }

    #[test]
    fn unknown_node_name_is_an_error() {
        let doc = "name: ghost\nnodes: {}\n";
        let cfg = ClusterConfig::parse(doc).unwrap();
        assert!(cfg.this_node().is_err());
    }
}
