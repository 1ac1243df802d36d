use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use grantflow_server::config::loader::load_config;
use grantflow_server::{ServerBuilder, observability, resolve_config_path};

/// OAuth 2.0 authorization server backed by an in-memory store.
#[derive(Debug, Parser)]
#[command(name = "grantflow-server", version, about)]
struct Cli {
    /// Configuration file (TOML); falls back to GRANTFLOW_CONFIG, then grantflow.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("{e:#}");
        std::process::exit(2);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config_path, source) = resolve_config_path(cli.config);
    let mut cfg = load_config(Some(&config_path.to_string_lossy()))
        .map_err(anyhow::Error::msg)
        .context("Configuration error")?;

    tracing::info!(
        path = %config_path.display(),
        source = %source,
        "Configuration loaded"
    );
    observability::apply_logging_level(&cfg.logging.level);

    if let Some(host) = cli.host {
        cfg.server.host = host;
    }
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    let server = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .context("Server initialization failed")?;
    server.run().await.context("Server error")
}
