//! Error types for ddb-api

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// ddb-common error
    #[error("Common error: {0}")]
    Common(#[from] ddb_common::Error),
}

impl ApiError {
    pub fn not_found(kind: &str, id: i64) -> Self {
        ApiError::NotFound(format!("{} {}", kind, id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ddb_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(ddb_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => {
                error!("Store failure: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", err.to_string())
            }
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
