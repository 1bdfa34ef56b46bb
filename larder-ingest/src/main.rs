//! larder-ingest - Receipt Ingestion Service
//!
//! Accepts receipt images, drives asynchronous extraction through a bounded
//! poll loop, and reconciles user-selected line items into the inventory
//! store with an at-most-once commit.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use larder_common::events::EventBus;
use larder_ingest::config::ServiceConfig;
use larder_ingest::services::HttpExtractionClient;
use larder_ingest::AppState;

/// Command-line arguments for larder-ingest
#[derive(Parser, Debug)]
#[command(name = "larder-ingest")]
#[command(about = "Receipt ingestion service for larder")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5720", env = "LARDER_INGEST_PORT")]
    port: u16,

    /// Data directory (database, config, receipt images)
    #[arg(short, long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder_ingest=info,larder_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting larder-ingest (Receipt Ingestion) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let data_dir =
        larder_common::config::resolve_data_dir(args.data_dir.as_deref(), "LARDER_DATA_DIR");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    info!("Data directory: {}", data_dir.display());

    let config = ServiceConfig::load(&data_dir).context("Failed to load configuration")?;

    let db_pool = larder_common::db::init_database(&config.db_path())
        .await
        .context("Failed to initialize database")?;
    info!("Database: {}", config.db_path().display());

    std::fs::create_dir_all(config.image_dir())
        .context("Failed to create receipt image directory")?;

    let event_bus = EventBus::new(256);

    let extraction = Arc::new(
        HttpExtractionClient::new(&config.extraction)
            .context("Failed to build extraction client")?,
    );
    info!("Extraction service: {}", config.extraction.base_url);

    let state = AppState::new(db_pool, event_bus, extraction, config);

    // Watchers die with the process but the rows do not; pick polling back
    // up for every receipt left non-terminal by the previous run
    let resumed = state
        .poller
        .resume_unfinished(&state.watchers)
        .await
        .context("Failed to resume unfinished receipts")?;
    if resumed > 0 {
        info!(count = resumed, "Resumed unfinished receipts from last run");
    }

    let app = larder_ingest::build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop active watchers; their receipts resume on the next start
    for (_, token) in state.watchers.read().await.iter() {
        token.cancel();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
