//! Error types for dscout-engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::EventSource;

/// Engine error taxonomy
///
/// Only `InvalidQuery` ever reaches the caller. The other variants are
/// recovered where they occur: an unavailable provider contributes zero
/// events, a failed classification contributes zero weight, an
/// unavailable cache falls back to direct computation. Once inputs
/// validate, an analysis request always completes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing required identifying parameter (fatal, returned to caller)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Provider could not contribute (recovered as empty contribution)
    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: EventSource, reason: String },

    /// AI classification failed (recovered as zero weight)
    #[error("Classification failure: {0}")]
    ClassificationFailure(String),

    /// Cache store unreachable (recovered by direct computation)
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
}

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

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// dscout-common error
    #[error("Common error: {0}")]
    Common(#[from] dscout_common::Error),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidQuery(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
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
