//! livestream-ingest library interface
//!
//! Live race-timing ingestion: a watched timing log is parsed, each punch is
//! resolved to a registered participant and stored idempotently, and the
//! latest results are mirrored to a spreadsheet for spectators.

pub mod api;
pub mod db;
pub mod error;
pub mod parser;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{PipelineContext, WatchOrchestrator};
use sqlx::SqlitePool;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, shared with the ingestion task
    pub db: SqlitePool,
    pub context: PipelineContext,
    pub orchestrator: WatchOrchestrator,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(context: PipelineContext, debounce: Duration) -> Self {
        Self {
            db: context.db.clone(),
            orchestrator: WatchOrchestrator::new(context.clone(), debounce),
            context,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::watch_routes())
        .merge(api::mirror_routes())
        .merge(api::result_routes())
        .merge(api::participant_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
