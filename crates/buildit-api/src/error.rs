//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// A `BadRequest` that also carries the offending document's
    /// `(line, column)`, per §4.1's failure contract.
    BadRequestAt(String, buildit_core::pipeline::SourceSpan),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::BadRequestAt(msg, span) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": msg,
                    "line": span.line,
                    "column": span.column,
                }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<buildit_config::ConfigError> for ApiError {
    fn from(err: buildit_config::ConfigError) -> Self {
        ApiError::BadRequestAt(err.message, err.span)
    }
}

impl From<buildit_db::DbError> for ApiError {
    fn from(err: buildit_db::DbError) -> Self {
        match err {
            buildit_db::DbError::NotFound(msg) => ApiError::NotFound(msg),
            buildit_db::DbError::InvalidFilter(msg) => {
                ApiError::BadRequest(format!("invalid filter column: {msg}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<buildit_cache::CacheError> for ApiError {
    fn from(err: buildit_cache::CacheError) -> Self {
        match err {
            // §7/S5: an unresolvable executionId is a 400, not a 404 —
            // the waitboard miss is surfaced to the caller verbatim.
            buildit_cache::CacheError::Miss(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<buildit_queue::QueueError> for ApiError {
    fn from(err: buildit_queue::QueueError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
