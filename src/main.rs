mod config;
mod connection;
mod document;
mod error;
mod http;
mod models;
mod mongodb;
mod pages;
mod profile;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::http::AppState;
use crate::mongodb::{MongoProbe, MongoService, Timeouts};
use crate::store::ConnectionStore;

/// A web administration console for `MongoDB`.
///
/// Browse databases and collections, page through and edit documents, and
/// manage named connection profiles stored in a local JSON file.
#[derive(Parser)]
#[command(name = "mongo-web-console")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Web administration console for MongoDB", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8082)]
    port: u16,

    /// JSON file holding the connection profiles
    #[arg(long, env = "CONNECTIONS_FILE", default_value = "connections.json")]
    connections_file: String,

    /// Timeout in seconds for each database operation
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Timeout in seconds for connecting and for dropping a database
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Log a fatal startup error and hand it back for `main` to return.
fn fatal(err: anyhow::Error) -> anyhow::Error {
    tracing::error!("{err:#}");
    err
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments (handles --version and --help automatically)
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mongo_web_console=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::new(
        cli.host,
        cli.port,
        &cli.connections_file,
        Timeouts {
            operation_secs: cli.timeout_secs,
            connect_secs: cli.connect_timeout_secs,
        },
    )
    .map_err(fatal)?;

    let store = ConnectionStore::load(&config.connections_file)
        .context("Failed to load connection profiles")
        .map_err(fatal)?;
    tracing::info!("Connection store: {}", store.path().display());

    let current = store
        .current()
        .context("No database connection configured")
        .map_err(fatal)?;
    tracing::info!(
        "Using connection '{}' ({}:{})",
        current.name,
        current.host,
        current.port
    );

    let service = Arc::new(
        MongoService::connect(&current.uri(), config.timeouts)
            .await
            .context("Failed to connect to MongoDB")
            .map_err(fatal)?,
    );

    let state = AppState {
        service: service.clone(),
        store: Arc::new(store),
        probe: Arc::new(MongoProbe::new(config.timeouts)),
    };

    http::serve(state, &config.bind_address(), shutdown_signal())
        .await
        .with_context(|| format!("Failed to serve on {}", config.bind_address()))
        .map_err(fatal)?;

    service.client().clone().shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}
