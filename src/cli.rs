//! Command-line interface for chatchess.

use clap::{Parser, Subcommand};

/// Chatchess - chess games in shared chat channels
#[derive(Parser, Debug)]
#[command(name = "chatchess")]
#[command(about = "Chess arbiter for chat channels, with an optional engine opponent", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP event gateway
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Path to the configuration file
        #[arg(short, long, default_value = "chatchess.toml")]
        config: std::path::PathBuf,
    },

    /// Spawn the configured engine, run the handshake and ask for one move
    CheckEngine {
        /// Path to the configuration file
        #[arg(short, long, default_value = "chatchess.toml")]
        config: std::path::PathBuf,
    },
}
