//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache backend.
///
/// Persistence failures of the file and database tiers are logged by the
/// background machinery and never reach a cache caller; the variant exists
/// for the adapters' own `load`/`save` entry points.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key missing or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Another `lock_run` holds the id inside its window
    #[error("The system is busy, please try again later: {0}")]
    Busy(String),

    /// Caller-supplied creator failed
    #[error("Creator failed: {0}")]
    Creator(#[source] anyhow::Error),

    /// Caller-supplied `lock_run` task failed
    #[error("Task failed: {0}")]
    Task(#[source] anyhow::Error),

    /// Payload could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file or relational store failure
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Remote key-value store failure
    #[error("Remote store failure: {0}")]
    Remote(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Returns true for a missing or expired key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    /// Returns true when `lock_run` lost the race for its id.
    pub fn is_busy(&self) -> bool {
        matches!(self, CacheError::Busy(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Busy(_) => StatusCode::CONFLICT,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Creator(_) | CacheError::Task(_) | CacheError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CacheError::Persistence(_) | CacheError::Remote(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
