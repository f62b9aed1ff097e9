//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for every cache backend and the HTTP front.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Storing the entry would push the allocated total over the budget
    #[error("memory limit: {requested} bytes requested, {allocated} of {budget} allocated")]
    CapacityExceeded {
        requested: i64,
        allocated: i64,
        budget: i64,
    },

    /// Keys must be non-empty
    #[error("cache key cannot be empty")]
    InvalidKey,

    /// Set-if-absent refused by the remote store
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// The remote store has no encoding for this payload type
    #[error("unsupported payload type: {0}")]
    UnsupportedPayload(&'static str),

    /// The remote store could not be reached
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The remote store rejected an operation
    #[error("backend error: {0}")]
    Backend(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::CapacityExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            CacheError::InvalidKey
            | CacheError::InvalidRequest(_)
            | CacheError::UnsupportedPayload(_) => StatusCode::BAD_REQUEST,
            CacheError::KeyExists(_) => StatusCode::CONFLICT,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::BackendUnavailable(_) | CacheError::Backend(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
