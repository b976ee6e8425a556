//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Storage calls block
//! on I/O, so they run on tokio's blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, DeleteResponse, ExistsResponse, FlushResponse, GetResponse, HealthResponse,
    SetResponse, StoreRequest,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache facade
    pub cache: Arc<Cache>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self::new(Cache::new(config)?))
    }

    /// Runs a blocking cache operation off the async worker threads.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Cache) -> T + Send + 'static,
        T: Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || op(&cache))
            .await
            .map_err(|e| CacheError::Internal(format!("cache task failed: {}", e)))
    }
}

/// Handler for PUT /cache/:key
///
/// Stores a value with optional TTL. Responds 503 when the backend could
/// not persist it.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<SetResponse>> {
    validate_key(&key)?;

    let stored = {
        let key = key.clone();
        state
            .run(move |cache| cache.set(&key, &req.value, req.ttl_seconds()))
            .await?
    };

    if !stored {
        return Err(CacheError::StorageUnavailable(format!(
            "failed to store key '{}'",
            key
        )));
    }

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    validate_key(&key)?;

    let lookup = key.clone();
    match state.run(move |cache| cache.get(&lookup)).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for GET /cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>> {
    validate_key(&key)?;

    let lookup = key.clone();
    let exists = state.run(move |cache| cache.exists(&lookup)).await?;
    Ok(Json(ExistsResponse { key, exists }))
}

/// Handler for POST /cache/:key/remember
///
/// Returns the cached value if present, otherwise stores and returns the
/// value from the request body.
pub async fn remember_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<GetResponse>> {
    validate_key(&key)?;

    let lookup = key.clone();
    let value = state
        .run(move |cache| {
            let ttl = req.ttl_seconds();
            cache.remember(&lookup, req.value, ttl)
        })
        .await?;
    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    validate_key(&key)?;

    let lookup = key.clone();
    if state.run(move |cache| cache.delete(&lookup)).await? {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for DELETE /cache
pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<FlushResponse>> {
    if state.run(|cache| cache.flush()).await? {
        Ok(Json(FlushResponse::flushed()))
    } else {
        Err(CacheError::StorageUnavailable(
            "failed to flush the cache".to_string(),
        ))
    }
}

/// Handler for GET /health
///
/// Reports the active backend and whether it currently accepts writes.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let (backend, connected) = state
        .run(|cache| (cache.backend_name().to_string(), cache.is_connected()))
        .await?;
    Ok(Json(HealthResponse::new(backend, connected)))
}
