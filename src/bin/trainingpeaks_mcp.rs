// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # TrainingPeaks MCP Server Binary
//!
//! Serves the analysis tools over stdio (for MCP clients that spawn the
//! server) or over TCP.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use trainingpeaks_mcp::{
    cache::ActivityFileCache, config::Config, decoder::FitDecoder, logging,
    mcp::McpServer, providers::create_provider, service::AnalysisService,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Tcp,
}

#[derive(Parser, Debug)]
#[command(name = "trainingpeaks-mcp")]
#[command(author, version, about = "MCP server for TrainingPeaks workout analytics")]
struct Args {
    /// How MCP clients connect
    #[arg(short, long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// Port for the TCP transport
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;

    let args = Args::parse();
    let config = Config::load(args.config)?;
    info!("{}", config.summary());

    let cache = ActivityFileCache::open(&config.cache.directory, config.cache.max_bytes)
        .await
        .context("Failed to open activity file cache")?;

    let service = AnalysisService::new(
        create_provider(&config.api)?,
        Arc::new(FitDecoder::new()),
        Arc::new(cache),
        config.analysis.clone(),
    );
    let server = McpServer::new(Arc::new(service));

    match args.transport {
        Transport::Stdio => server.run_stdio().await,
        Transport::Tcp => server.run_tcp(args.port).await,
    }
}
