//! Mirror destination endpoints

use crate::services::MirrorTarget;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct MirrorConfigRequest {
    pub sheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Serialize)]
pub struct MirrorConfigResponse {
    pub target: Option<MirrorTarget>,
    /// False when no Sheets access token was configured at startup
    pub credentials: bool,
}

async fn config_response(state: &AppState) -> MirrorConfigResponse {
    MirrorConfigResponse {
        target: state.context.mirror.target().await,
        credentials: state.context.mirror.has_client(),
    }
}

/// POST /mirror/config
///
/// Takes effect on the next ingestion pass.
///
/// **Errors:**
/// - 400 Bad Request: blank spreadsheet id or tab name
pub async fn configure_mirror(
    State(state): State<AppState>,
    Json(request): Json<MirrorConfigRequest>,
) -> ApiResult<Json<MirrorConfigResponse>> {
    let spreadsheet_id = request.sheet_id.trim();
    let tab_name = request.sheet_name.trim();
    if spreadsheet_id.is_empty() || tab_name.is_empty() {
        return Err(ApiError::BadRequest(
            "sheet_id and sheet_name are required".to_string(),
        ));
    }

    state
        .context
        .mirror
        .configure(MirrorTarget {
            spreadsheet_id: spreadsheet_id.to_string(),
            tab_name: tab_name.to_string(),
        })
        .await;

    Ok(Json(config_response(&state).await))
}

/// GET /mirror/config
pub async fn mirror_config(State(state): State<AppState>) -> Json<MirrorConfigResponse> {
    Json(config_response(&state).await)
}

/// Build mirror routes
pub fn mirror_routes() -> Router<AppState> {
    Router::new().route("/mirror/config", get(mirror_config).post(configure_mirror))
}
