//! `careaccessd`: the care access server binary.
//!
//! Usage:
//!   careaccessd -c <config.toml> [--listen <addr>]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use careaccess_core::SystemClock;
use careaccess_server::{bootstrap, build_router, spawn_sweeper, ServerConfig};

/// Care access server.
#[derive(Parser, Debug)]
#[command(name = "careaccessd", about = "Delegated medical record access server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: PathBuf,

    /// Listen address (overrides `server.listen`).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from {}", cli.config.display());
    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let (state, verifier) = bootstrap::build(&config, Arc::new(SystemClock))?;
    info!(
        backend = ?config.storage.backend,
        grant_duration_secs = config.access.grant_duration_secs,
        token_use = ?config.access.token_use,
        renewal = ?config.access.renewal,
        "access service initialized"
    );

    let sweeper = spawn_sweeper(
        Arc::clone(&state.service),
        config.sweep.interval(),
        config.sweep.retention(),
    );

    let app = build_router(state, verifier);

    let listen = cli.listen.unwrap_or(config.server.listen);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("careaccessd listening on {}", listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("careaccessd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
