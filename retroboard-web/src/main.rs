//! Retroboard Web Server
//!
//! HTTP interface to the board session registry.

use anyhow::Context;
use clap::Parser;
use retroboard_core::{init_logging, LogFormat, RetroboardConfig};
use retroboard_web::server::RetroboardServerBuilder;
use std::path::PathBuf;
use tracing::info;

/// Retroboard Web Server - board participant sessions over HTTP
#[derive(Parser)]
#[command(name = "retroboard-web")]
#[command(about = "HTTP server for Retroboard participant sessions")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Database URL (`sqlite:...` or `memory`)
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = match &args.config {
        Some(path) => RetroboardConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RetroboardConfig::default(),
    };
    config.apply_env()?;

    // Command line wins over file and environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.storage.database_url = database_url;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }

    config.validate()?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!(e))?;

    info!(
        "Starting Retroboard on http://{} (storage: {})",
        config.server.address(),
        config.storage.database_url
    );

    let server = RetroboardServerBuilder::new().config(config).build().await?;
    server.start().await?;

    Ok(())
}
