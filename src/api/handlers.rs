//! API Handlers
//!
//! HTTP request handlers for each image cache endpoint.

use std::io;
use std::path::{Path, PathBuf};

use axum::{extract::State, Json};
use tracing::{info, warn};

use crate::cache::{CacheEngine, CacheInfo, CacheOverrides, CachedResolver, ResolvedPaths};
use crate::error::{CacheError, Result};
use crate::models::{
    CachedResponse, ClearResponse, DeleteRequest, DeleteResponse, DownloadRequest,
    HealthResponse, SeedRequest, StatsResponse,
};

/// Application state shared across all handlers.
///
/// Every field is internally shared, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Engine plus the resolved-path overlay
    pub resolver: CachedResolver,
    /// Only files under this directory may be seeded; `None` disables seeding
    pub seed_dir: Option<PathBuf>,
}

impl AppState {
    /// Creates a new AppState around `engine` with an empty overlay and
    /// seeding disabled.
    pub fn new(engine: CacheEngine) -> Self {
        Self {
            resolver: CachedResolver::new(engine, ResolvedPaths::new()),
            seed_dir: None,
        }
    }

    /// Allows seeding from files under `dir`.
    pub fn with_seed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.seed_dir = Some(dir.into());
        self
    }

    pub fn engine(&self) -> &CacheEngine {
        self.resolver.engine()
    }
}

/// Resolves `requested` against `seed_dir` and rejects anything that does
/// not canonicalize to a path inside it.
///
/// Missing files and files outside the directory get the same error.
async fn confined_seed_path(seed_dir: Option<&Path>, requested: &Path) -> Result<PathBuf> {
    let seed_dir = seed_dir.ok_or_else(|| {
        CacheError::InvalidArgument("seeding from local files is disabled".to_string())
    })?;
    let root = tokio::fs::canonicalize(seed_dir)
        .await
        .map_err(|e| CacheError::filesystem("canonicalize", seed_dir, e))?;

    let rejected = || {
        CacheError::InvalidArgument(format!(
            "seed path '{}' is not a file inside the seed directory",
            requested.display()
        ))
    };

    let candidate = root.join(requested);
    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(rejected()),
        Err(e) => return Err(CacheError::filesystem("canonicalize", &candidate, e)),
    };

    if !resolved.starts_with(&root) {
        warn!(requested = %requested.display(), "Rejected seed path outside the seed directory");
        return Err(rejected());
    }
    Ok(resolved)
}

/// Handler for POST /cache/download
///
/// Returns the local path of `url`, downloading it first when needed.
pub async fn download_handler(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<CachedResponse>> {
    let overrides = req.options.to_overrides();
    let path = state.resolver.resolve(&req.url, &overrides).await?;
    Ok(Json(CachedResponse::new(req.url, path)))
}

/// Handler for POST /cache/seed
///
/// Registers a file from the seed directory as the cached copy of `url`.
pub async fn seed_handler(
    State(state): State<AppState>,
    Json(req): Json<SeedRequest>,
) -> Result<Json<CachedResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg));
    }

    let seed = confined_seed_path(state.seed_dir.as_deref(), &req.seed_path).await?;
    let path = state
        .engine()
        .seed_and_cache_url(&req.url, &seed, &req.options.to_overrides())
        .await?;
    state.resolver.overlay().set_cached(&req.url, &path)?;

    Ok(Json(CachedResponse::new(req.url, path)))
}

/// Handler for DELETE /cache/entry
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>> {
    state
        .resolver
        .delete(&req.url, &req.options.to_overrides())
        .await?;
    Ok(Json(DeleteResponse::new(req.url)))
}

/// Handler for DELETE /cache
///
/// Empties the default cache root and the index.
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.resolver.clear(&CacheOverrides::default()).await?;
    info!("Cache cleared over HTTP");
    Ok(Json(ClearResponse::cleared()))
}

/// Handler for GET /cache/info
pub async fn info_handler(State(state): State<AppState>) -> Result<Json<CacheInfo>> {
    let info = state.engine().cache_info(&CacheOverrides::default()).await?;
    Ok(Json(info))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let engine = state.engine();
    Json(StatsResponse::new(&engine.stats(), engine.inflight().len()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
