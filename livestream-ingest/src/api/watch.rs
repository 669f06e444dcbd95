//! Watch control endpoints
//!
//! - `POST /watch/start` `{"file_path": "..."}`: watch a timing log,
//!   replacing any active watch
//! - `POST /watch/stop`: stop watching, back to `idle`
//! - `GET /watch/status`: state, counters and the last pass report

use crate::services::{WatchAck, WatchStatus};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct StartWatchRequest {
    pub file_path: PathBuf,
}

/// POST /watch/start
///
/// **Errors:**
/// - 400 Bad Request: empty path, missing file, or not a regular file
pub async fn start_watch(
    State(state): State<AppState>,
    Json(request): Json<StartWatchRequest>,
) -> ApiResult<Json<WatchAck>> {
    if request.file_path.as_os_str().is_empty() {
        return Err(ApiError::BadRequest("file_path is required".to_string()));
    }

    info!(path = %request.file_path.display(), "Watch requested");
    let ack = state.orchestrator.start_watch(&request.file_path).await?;
    Ok(Json(ack))
}

/// POST /watch/stop
pub async fn stop_watch(State(state): State<AppState>) -> Json<WatchStatus> {
    state.orchestrator.stop_watch().await;
    Json(state.orchestrator.status().await)
}

/// GET /watch/status
pub async fn watch_status(State(state): State<AppState>) -> Json<WatchStatus> {
    Json(state.orchestrator.status().await)
}

/// Build watch routes
pub fn watch_routes() -> Router<AppState> {
    Router::new()
        .route("/watch/start", post(start_watch))
        .route("/watch/stop", post(stop_watch))
        .route("/watch/status", get(watch_status))
}
