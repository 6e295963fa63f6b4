//! remotectl operator console entry point.

mod app;
mod commands;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Drives WebSocket and HTTP endpoints from a line-oriented console.
#[derive(Parser, Debug)]
#[command(name = "remotectl", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint registry file, overriding the configured one.
    #[arg(long)]
    servers: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting remotectl console"
    );

    let mut config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    if let Some(servers) = cli.servers {
        config.servers_path = Some(servers);
    }
    tracing::info!(sender = %config.sender_id, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("console shut down cleanly");
    Ok(())
}
