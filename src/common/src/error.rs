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

use std::fmt;

/// Error taxonomy for the coordinator, per the propagation policy: parse and
/// lookup failures are reported locally without side effects, RPC failures
/// are converted to a single-row explanatory result, and anything else is
/// caught at the handler boundary and reported the same way.
#[derive(thiserror::Error, Debug)]
pub enum ShardqError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("connection from {site} closed")]
    Connection { site: String },

    #[error("{0}")]
    Remote(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShardqError {
    pub fn parse(msg: impl fmt::Display) -> Self {
        Self::Parse(msg.to_string())
    }

    pub fn catalog(msg: impl fmt::Display) -> Self {
        Self::Catalog(msg.to_string())
    }

    pub fn internal(msg: impl fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// The one-row text the client sees, per §7's "one-row explanatory
    /// result" / "one-row text" rules.
    pub fn as_client_row(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for ShardqError {
    fn from(e: std::io::Error) -> Self {
        Self::Connection {
            site: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShardqError>;
