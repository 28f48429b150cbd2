//! Strictly Tables - gomoku table host binary.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use std::sync::Arc;
use strictly_tables::{AppConfig, Dispatcher, InMemoryLedger, SessionRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_tables=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { config, host, port } => run_server(config, host, port).await,
        Command::Config { config } => print_config(config),
    }
}

/// Run the WebSocket table host
async fn run_server(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = AppConfig::load(Some(config_path.as_path()))?.with_binding(host, port);
    info!(
        host = %config.server().host(),
        port = config.server().port(),
        max_sessions = config.session().max_sessions(),
        "Starting Strictly Tables"
    );

    let ledger = Arc::new(InMemoryLedger::new());
    let registry = SessionRegistry::new(*config.session());
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        &config,
        ledger.clone(),
        ledger,
    ));

    strictly_tables::serve(&config, dispatcher).await
}

/// Print the resolved configuration
fn print_config(config_path: PathBuf) -> Result<()> {
    let config = AppConfig::load(Some(config_path.as_path()))?;
    print!("{}", config.to_toml()?);
    Ok(())
}
