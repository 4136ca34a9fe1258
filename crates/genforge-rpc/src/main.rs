//! Genforge RPC Server - JSON-RPC front end for the generation queue.
//!
//! Wraps `genforge-core` in a JSON-RPC 2.0 server so that other processes can
//! submit prompts, poll jobs and manage the semantic cache.

mod handlers;
mod server;
mod wrapper;

use anyhow::{Context, Result};
use clap::Parser;
use genforge_core::config::TransportDefaults;
use genforge_core::providers::AnthropicTransport;
use genforge_core::Genforge;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "genforge-rpc")]
#[command(about = "JSON-RPC server for the genforge generation pipeline")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Directory holding the cache and job records
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// API key for the generation service
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model id to generate with
    #[arg(long)]
    model: Option<String>,

    /// Use the small, fast model
    #[arg(long, conflicts_with = "model")]
    fast: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("genforge"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Genforge RPC Server");

    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    info!("Data directory: {}", data_dir.display());

    let model = match (args.model, args.fast) {
        (Some(model), _) => model,
        (None, true) => TransportDefaults::FAST_MODEL.to_string(),
        (None, false) => TransportDefaults::DEFAULT_MODEL.to_string(),
    };
    let transport = AnthropicTransport::new(args.api_key)
        .context("failed to configure the generation transport")?
        .with_model(model);
    info!("Generating with {}", transport.model());

    let forge = Genforge::builder(&data_dir)
        .auto_create_dirs(true)
        .with_transport(Arc::new(transport))
        .build()
        .await?;

    let (addr, state) = server::start_server(forge, &args.host, args.port).await?;

    // Machine-readable port line for parent processes.
    println!("RPC_PORT={}", addr.port());
    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, flushing cache");
    if let Err(e) = state.forge.flush_cache().await {
        tracing::warn!("Failed to flush cache on shutdown: {}", e);
    }

    Ok(())
}
