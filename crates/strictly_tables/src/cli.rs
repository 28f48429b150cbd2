//! Command-line interface for strictly_tables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Tables - real-time gomoku table host
#[derive(Parser, Debug)]
#[command(name = "strictly_tables")]
#[command(about = "Real-time gomoku table host with spectators and chat", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket table host
    Serve {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "strictly_tables.toml")]
        config: PathBuf,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the resolved configuration as TOML
    Config {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "strictly_tables.toml")]
        config: PathBuf,
    },
}
