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
// Coordinator entrypoint (C8): loads the cluster topology, opens the
// catalog's on-disk metadata store, and serves the client-facing line
// protocol on this node's `cli-port`.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use shardq_batch::ExecContext;
use shardq_catalog::Catalog;
use shardq_cmd::Dispatcher;
use shardq_common::config::ClusterConfig;

#[derive(Parser, Debug)]
#[command(name = "shardqd", about = "shardq coordinator daemon")]
struct Args {
    /// Path to the cluster topology document (YAML, per §6).
    #[arg(long, default_value = "cluster.yaml")]
    config: String,

    /// Directory the catalog's metadata store is kept under.
    #[arg(long, default_value = "./shardq-catalog")]
    catalog_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    shardq_common::logging::init_logger("shardqd=info,shardq_batch=info,shardq_rpc=info");

    let cluster = ClusterConfig::load(&args.config)?;
    let this_node = cluster.this_node()?;

    let site_addrs: HashMap<String, String> = cluster
        .nodes
        .iter()
        .map(|(name, node)| (name.clone(), format!("{}:{}", node.host, node.port)))
        .collect();

    let catalog = Catalog::new(args.catalog_dir.clone());
    let ctx = ExecContext::new(site_addrs);
    let dispatcher = Arc::new(Dispatcher::new(catalog, ctx));

    let bind_addr = format!("0.0.0.0:{}", this_node.cli_port);
    tracing::info!(node = %cluster.name, bind_addr, "starting shardqd");
    shardq_cmd::cli_protocol::serve(&bind_addr, dispatcher).await?;
    Ok(())
}
