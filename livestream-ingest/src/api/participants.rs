//! Participant endpoints
//!
//! Roster rows come either inline (`rows`) or from a tab of the configured
//! spreadsheet (`sheet_name`).

use crate::db;
use crate::services::roster::{self, ImportReport};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use livestream_common::db::Participant;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub primary_event_name: String,
    #[serde(default)]
    pub rows: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub sheet_name: Option<String>,
}

/// POST /participants/import
///
/// **Request:** `{"primary_event_name": "...", "rows": [[...], ...]}` or
/// `{"primary_event_name": "...", "sheet_name": "Roster"}`
///
/// **Errors:**
/// - 400 Bad Request: neither or both row sources, blank or reserved event name
/// - 409 Conflict: `sheet_name` without a configured spreadsheet
/// - 502 Bad Gateway: the roster tab could not be read
pub async fn import_participants(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportReport>> {
    let rows = match (request.rows, request.sheet_name) {
        (Some(rows), None) => rows,
        (None, Some(sheet_name)) => {
            info!(tab = %sheet_name, "Reading roster from spreadsheet");
            state.context.mirror.read_tab(&sheet_name).await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "provide exactly one of rows or sheet_name".to_string(),
            ))
        }
    };

    let report =
        roster::import_participants(&state.db, &rows, &request.primary_event_name).await?;
    Ok(Json(report))
}

/// GET /participants
///
/// Participants grouped by event name.
pub async fn list_participants(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, Vec<Participant>>>> {
    Ok(Json(db::list_participants_by_event(&state.db).await?))
}

/// Build participant routes
pub fn participant_routes() -> Router<AppState> {
    Router::new()
        .route("/participants", get(list_participants))
        .route("/participants/import", post(import_participants))
}
