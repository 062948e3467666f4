//! API Routes
//!
//! Configures the Axum router with all image cache endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_entry_handler, download_handler, health_handler, info_handler,
    seed_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /cache/download` - Resolve a URL to a local file, downloading if needed
/// - `POST /cache/seed` - Register a local file under a URL
/// - `DELETE /cache/entry` - Drop one URL from the cache
/// - `DELETE /cache` - Empty the cache
/// - `GET /cache/info` - List cached files and their total size
/// - `GET /stats` - Get engine statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache/download", post(download_handler))
        .route("/cache/seed", post(seed_handler))
        .route("/cache/entry", delete(delete_entry_handler))
        .route("/cache", delete(clear_handler))
        .route("/cache/info", get(info_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
