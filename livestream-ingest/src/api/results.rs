//! Result listing endpoint

use crate::db::{self, SortOrder};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use livestream_common::db::ResultRow;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 10_000;

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    /// All stored results, not just this page
    pub total: i64,
    pub order: SortOrder,
    pub results: Vec<ResultRow>,
}

/// GET /results?limit=&order=newest|oldest
///
/// `limit` defaults to 100 and is capped at 10000.
///
/// **Errors:**
/// - 400 Bad Request: limit below 1
pub async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<Json<ResultsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit < 1 {
        return Err(ApiError::BadRequest(format!(
            "limit must be at least 1, got {}",
            limit
        )));
    }

    let results = db::latest_results(&state.db, limit.min(MAX_LIMIT), query.order).await?;
    let total = db::count_results(&state.db).await?;

    Ok(Json(ResultsResponse {
        total,
        order: query.order,
        results,
    }))
}

/// Build result routes
pub fn result_routes() -> Router<AppState> {
    Router::new().route("/results", get(list_results))
}
