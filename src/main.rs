//! Image Cache daemon
//!
//! Serves the image cache over HTTP with a background index sweeper.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_cache::api::{create_router, AppState};
use image_cache::index::{CacheIndex, MemoryIndex};
use image_cache::{spawn_sweep_task, CacheEngine, Config};

/// Main entry point for the image cache daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Restore the index snapshot and build the engine
/// 4. Start background sweep task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. On SIGINT/SIGTERM stop the sweeper and persist the index
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Image Cache daemon");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_root={}, default_ttl={}s, port={}, sweep_interval={}s",
        config.cache_root.display(),
        config.default_ttl,
        config.server_port,
        config.sweep_interval
    );

    let index = MemoryIndex::load(&config.index_snapshot)
        .await
        .context("failed to load index snapshot")?;
    info!(
        "Index restored from {} ({} entries)",
        config.index_snapshot.display(),
        index.len().await
    );

    let index: Arc<dyn CacheIndex> = Arc::new(index);
    let engine = CacheEngine::http(config.cache_options(), index)
        .context("failed to build HTTP transport")?;

    let sweep_handle = spawn_sweep_task(engine.clone(), config.sweep_interval);
    info!("Background sweep task started");

    let mut state = AppState::new(engine.clone());
    match &config.seed_dir {
        Some(dir) => {
            info!("Seeding enabled from {}", dir.display());
            state = state.with_seed_dir(dir);
        }
        None => info!("Seeding over HTTP disabled (SEED_DIR unset)"),
    }
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
        .context("server error")?;

    if let Err(e) = engine.persist_index().await {
        warn!(error = %e, "Failed to persist index on shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the sweep task and allows graceful shutdown.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweep_handle.abort();
    warn!("Sweep task aborted");
}
