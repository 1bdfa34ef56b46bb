//! larder-ingest library interface
//!
//! Receipt ingestion service: submission gateway, bounded extraction
//! status polling, line-item selection, and the at-most-once reconciliation
//! commit into inventory. Exposed as a library so integration tests can
//! build the router against an in-memory database and a fake extraction
//! service.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use larder_common::events::EventBus;

use crate::config::ServiceConfig;
use crate::services::extraction::ExtractionService;
use crate::services::poller::{PollPolicy, StatusPoller, WatcherMap};

/// Extra body allowance above the configured upload cap, so the cap itself
/// is enforced by the handler's validation (400) rather than the transport
/// layer (413)
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Cancellation tokens for active watcher tasks
    pub watchers: WatcherMap,
    /// External extraction service handle
    pub extraction: Arc<dyn ExtractionService>,
    /// Poller driving bounded status queries
    pub poller: StatusPoller,
    /// Service configuration
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        extraction: Arc<dyn ExtractionService>,
        config: ServiceConfig,
    ) -> Self {
        let poller = StatusPoller::new(
            db.clone(),
            Arc::clone(&extraction),
            event_bus.clone(),
            PollPolicy::from_config(&config.ingest),
        );

        Self {
            db,
            event_bus,
            watchers: WatcherMap::default(),
            extraction,
            poller,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let body_limit = state.config.ingest.max_upload_bytes + BODY_LIMIT_SLACK;

    Router::new()
        .merge(api::submission_routes())
        .merge(api::receipt_routes())
        .merge(api::selection_routes())
        .merge(api::commit_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
