//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::cache::{Cache, MemoryCache, Value};
use crate::config::{Backend, Config};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FlushResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// Holds the backend behind the cache contract. When the backend is the
/// memory cache its concrete handle is kept as well, for detailed stats.
#[derive(Clone)]
pub struct AppState {
    /// Backend-agnostic cache
    pub cache: Arc<dyn Cache>,
    /// Concrete memory cache, if that is the backend
    pub memory: Option<Arc<MemoryCache>>,
}

impl AppState {
    /// Creates a new AppState over any backend.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            memory: None,
        }
    }

    /// Creates a new AppState over a memory cache.
    pub fn memory(cache: Arc<MemoryCache>) -> Self {
        Self {
            cache: cache.clone(),
            memory: Some(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// The memory backend's sweeper is bound to `scope`. Fails if the
    /// configured remote backend is unreachable or not compiled in.
    pub fn from_config(config: &Config, scope: &CancellationToken) -> Result<Self> {
        match config.backend {
            Backend::Memory => Ok(Self::memory(MemoryCache::from_config(config, scope))),
            #[cfg(feature = "redis")]
            Backend::Redis => {
                let cache = crate::cache::RedisCache::connect(&config.redis_config())?;
                Ok(Self::new(Arc::new(cache)))
            }
            #[cfg(not(feature = "redis"))]
            Backend::Redis => Err(CacheError::BackendUnavailable(
                "built without the `redis` feature".to_string(),
            )),
        }
    }
}

/// Runs a cache operation on the blocking pool.
///
/// Remote backends perform network I/O synchronously.
async fn run_blocking<T, F>(cache: &Arc<dyn Cache>, op: F) -> Result<T>
where
    F: FnOnce(&dyn Cache) -> T + Send + 'static,
    T: Send + 'static,
{
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || op(cache.as_ref()))
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl();
    let SetRequest { key, value, .. } = req;
    let response = SetResponse::new(key.clone());

    run_blocking(&state.cache, move |cache| {
        cache.set(&key, Value::from(value), ttl)
    })
    .await??;

    Ok(Json(response))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    let value = run_blocking(&state.cache, move |cache| cache.get(&lookup))
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    let json = value.to_json().ok_or_else(|| {
        CacheError::Internal(format!("payload of type {} has no JSON form", value.type_name()))
    })?;

    Ok(Json(GetResponse::new(key, json)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache. Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    let removed = run_blocking(&state.cache, move |cache| cache.forget(&target)).await?;
    if !removed {
        return Err(CacheError::Backend(format!("failed to delete '{}'", key)));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /flush
///
/// Removes every entry from the cache.
pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<FlushResponse>> {
    let flushed = run_blocking(&state.cache, |cache| cache.flush()).await?;
    Ok(Json(FlushResponse { flushed }))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let size = run_blocking(&state.cache, |cache| cache.size()).await?;
    let stats = state.memory.as_ref().map(|memory| memory.stats());

    Ok(Json(StatsResponse::new(state.cache.name(), size, stats)))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
