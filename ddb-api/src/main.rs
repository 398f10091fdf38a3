//! ddb-api - read-only REST server over a DiscourseDB store

use anyhow::{Context, Result};
use clap::Parser;
use ddb_api::{build_router, AppState};
use ddb_common::config::{self, TomlConfig};
use ddb_common::db::init::connect_readonly;
use ddb_common::Services;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for ddb-api
#[derive(Parser, Debug)]
#[command(name = "ddb-api")]
#[command(about = "Read-only REST API for DiscourseDB")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "DISCOURSEDB_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the configuration file)
    #[arg(short, long, env = "DISCOURSEDB_DATABASE")]
    database: Option<PathBuf>,

    /// Address to listen on (overrides `[api] bind_address`)
    #[arg(short, long, env = "DISCOURSEDB_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    let default_directive = format!(
        "ddb_api={0},ddb_common={0},tower_http={0}",
        toml_config.logging.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    info!(
        "Starting DiscourseDB API (ddb-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = config::resolve_database_path(args.database.as_deref(), &toml_config);
    info!("Database path: {}", db_path.display());

    let pool = match connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(Services::new(pool), toml_config.api.page_size);
    let app = build_router(state);

    let bind_address = args.bind.unwrap_or(toml_config.api.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("ddb-api listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
