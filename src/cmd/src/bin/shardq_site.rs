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
// Site entrypoint (C7): opens this site's local sqlite-backed storage
// engine and serves the binary RPC protocol fragments are created and
// queried over.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use shardq_cmd::SiteEngine;
use shardq_common::config::ClusterConfig;

#[derive(Parser, Debug)]
#[command(name = "shardq-site", about = "shardq site storage daemon")]
struct Args {
    /// Path to the cluster topology document (YAML, per §6).
    #[arg(long, default_value = "cluster.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    shardq_common::logging::init_logger("shardq_site=info,shardq_rpc=info");

    let cluster = ClusterConfig::load(&args.config)?;
    let this_node = cluster.this_node()?;

    let db_filename = cluster.sqldb_filename.clone().unwrap_or_else(|| format!("{}.db", cluster.name));
    let init_script = match &cluster.sqldb_initfile {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };

    let engine = Arc::new(SiteEngine::open(Path::new(&db_filename), init_script.as_deref())?);

    let bind_addr = format!("0.0.0.0:{}", this_node.port);
    tracing::info!(node = %cluster.name, bind_addr, db_filename, "starting shardq-site");
    shardq_rpc::serve(&bind_addr, engine).await?;
    Ok(())
}
