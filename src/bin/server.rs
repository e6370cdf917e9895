//! `dashstream` Server Binary
//!
//! Starts the dashboard WebSocket server.
//!
//! ## Usage
//!
//! ```bash
//! # Start server with config.toml / config.local.toml / DASHSTREAM_* env
//! cargo run --bin dashstream-server
//!
//! # Explicit config file and address override
//! cargo run --bin dashstream-server -- --config deploy.toml --host 0.0.0.0 --port 9000
//! ```
//!
//! ## Endpoints
//!
//! - WebSocket at `/ws`
//! - `/health`, `/live`, `/stats`

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use dashstream::config::LoggingConfig;
use dashstream::protocol::rest;
use dashstream::{Config, Handler};

static TRACE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Dashboard WebSocket server
#[derive(Parser, Debug)]
#[command(name = "dashstream-server")]
#[command(version, about = "Live dashboard WebSocket server", long_about = None)]
struct Args {
    /// Configuration file (replaces config.toml / config.local.toml)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Bind address override
    #[arg(long = "host")]
    host: Option<String>,

    /// Port override
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(&path.to_string_lossy())
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    init_tracing(&config.logging)?;

    let http_config = config.http.clone();
    let handler = Arc::new(Handler::from_config(config).context("invalid configuration")?);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %http_config.host,
        port = http_config.port,
        "server_starting"
    );

    rest::start_http_server(handler, &http_config).await?;

    info!("server_stopped");
    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) -> anyhow::Result<()> {
    // DASHSTREAM_LOG takes precedence over the configured level
    let level = env::var("DASHSTREAM_LOG").unwrap_or_else(|_| logging_config.level.clone());
    let filter = tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = logging_config.format == "json";

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match &logging_config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("unable to open log file '{path}'"))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = TRACE_GUARD.set(guard);

            let base = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_writer(non_blocking);
            if json {
                Box::new(base.json().finish())
            } else {
                Box::new(base.compact().finish())
            }
        }
        None => {
            let base = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            if json {
                Box::new(base.json().finish())
            } else {
                Box::new(base.compact().finish())
            }
        }
    };

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;
    Ok(())
}
