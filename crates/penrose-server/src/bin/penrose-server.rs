//! Penrose server binary.
//!
//! Serves the REST API and runs the background job tracker in one process.
//! Exits with a non-zero status if the tracker stops on a fatal fault.
//!
//! # Configuration
//!
//! An optional YAML file (`--config`), overridden by `PENROSE_*`
//! environment variables, e.g.:
//!
//! - `PENROSE_ADDRESS`          Listen address (default `0.0.0.0:8080`)
//! - `PENROSE_API_KEY`          Bearer token for job routes (optional)
//! - `PENROSE_STORAGE_BACKEND`  `memory` or `sqlite`
//! - `PENROSE_STORAGE_PATH`     SQLite database file
//! - `PENROSE_TAP_BASE_URL`     Gaia archive base URL
//! - `PENROSE_LOG_LEVEL`        Tracing filter (default `info`)
//!
//! # Usage
//!
//! ```bash
//! PENROSE_STORAGE_BACKEND=sqlite PENROSE_STORAGE_PATH=penrose.db penrose-server
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use penrose_server::{Config, init_tracing};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "penrose-server", version, about = "Gaia neighbourhood query tracker")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "PENROSE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    init_tracing(config.tracing_config())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Penrose server");
    tracing::debug!(?config, "Effective configuration");

    penrose_server::run(config, shutdown_signal())
        .await
        .context("server stopped with an error")?;

    info!("Penrose server shut down");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
