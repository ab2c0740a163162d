//! API Handlers
//!
//! HTTP request handlers exposing the cache contract over JSON.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::{Cache, CacheExt, Item};
use crate::config::BackendKind;
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, CacheValueRequest, DeleteResponse, GetResponse, HealthResponse, SetResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The active backend
    pub cache: Arc<dyn Cache>,
    /// Which backend `cache` is, reported by /health
    pub backend: BackendKind,
}

impl AppState {
    /// Creates a new AppState over the given backend.
    pub fn new(cache: Arc<dyn Cache>, backend: BackendKind) -> Self {
        Self { cache, backend }
    }
}

fn checked_key(key: String) -> Result<String> {
    match validate_key(&key) {
        Some(error_msg) => Err(CacheError::InvalidRequest(error_msg)),
        None => Ok(key),
    }
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let key = checked_key(key)?;
    let value: serde_json::Value = state.cache.get_value(&key).await?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for PUT /cache/:key
///
/// Stores the value unconditionally.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<CacheValueRequest>,
) -> Result<Json<SetResponse>> {
    let key = checked_key(key)?;
    let ttl = req.ttl();

    state
        .cache
        .set_value(&key, move || async move { anyhow::Ok(Item::new(req.value, ttl)) })
        .await?;
    debug!(key = %key, "Value set via API");

    Ok(Json(SetResponse::new(key)))
}

/// Handler for POST /cache/:key
///
/// Stores the value only if the key holds nothing live, and returns
/// whatever the cache holds afterwards.
pub async fn get_or_set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<CacheValueRequest>,
) -> Result<Json<GetResponse>> {
    let key = checked_key(key)?;
    let ttl = req.ttl();

    let value: serde_json::Value = state
        .cache
        .get_or_set_value(&key, move || async move {
            anyhow::Ok(Item::new(req.value, ttl))
        })
        .await?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
///
/// Succeeds whether or not the key existed.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let key = checked_key(key)?;
    state.cache.remove(&key).await;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.backend.as_str()))
}
