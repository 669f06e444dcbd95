//! Error types for livestream-ingest HTTP handlers

use crate::services::{MirrorError, WatchError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Spreadsheet unreachable or misconfigured (502)
    #[error("Spreadsheet error: {0}")]
    Upstream(String),

    /// livestream-common error
    #[error("Common error: {0}")]
    Common(#[from] livestream_common::Error),
}

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<MirrorError> for ApiError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::NotConfigured | MirrorError::NoCredentials => {
                ApiError::Conflict(err.to_string())
            }
            _ => ApiError::Upstream(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "SPREADSHEET_ERROR", msg),
            ApiError::Common(err) => match err {
                livestream_common::Error::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
                }
                livestream_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
                }
                livestream_common::Error::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    other.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_invalid_input_maps_to_400() {
        let response =
            ApiError::from(livestream_common::Error::InvalidInput("x".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_common_not_found_maps_to_404() {
        let response =
            ApiError::from(livestream_common::Error::NotFound("parent event 9".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_common_error_maps_to_500() {
        let response =
            ApiError::from(livestream_common::Error::Internal("x".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_database_error_maps_to_500() {
        let response =
            ApiError::from(livestream_common::Error::Database(sqlx::Error::RowNotFound))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unconfigured_mirror_maps_to_409() {
        let response = ApiError::from(MirrorError::NotConfigured).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
