//! Chatchess - unified CLI
//!
//! Chess games in shared chat channels, with an optional engine opponent.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use chatchess::{ChessConfig, CommandRouter, EngineBridge, SessionRegistry};
use clap::Parser;
use cli::{Cli, Command};
use std::path::Path;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, config } => run_gateway(host, port, &config).await,
        Command::CheckEngine { config } => check_engine(&config).await,
    }
}

#[instrument]
fn load_config(path: &Path) -> Result<ChessConfig> {
    if path.exists() {
        Ok(ChessConfig::from_file(path)?)
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Ok(ChessConfig::default())
    }
}

/// Run the HTTP event gateway
async fn run_gateway(host: String, port: u16, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    info!("Starting the chatchess gateway");

    let registry = SessionRegistry::new();
    let router = CommandRouter::new(config, registry);
    chatchess::serve(router, &host, port).await
}

/// One-shot engine probe for deployment smoke tests
async fn check_engine(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let engine_config = config.engine();
    info!(command = %engine_config.command(), "Probing the engine");

    let mut bridge = EngineBridge::start(engine_config).await?;
    let opening = bridge
        .best_move(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            engine_config.move_budget(),
        )
        .await;
    bridge.close().await;

    let mv = opening?;
    info!(%mv, "Engine answered; all good");
    println!("engine ok, suggested opening move: {mv}");
    Ok(())
}
