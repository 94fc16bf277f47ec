//! Process wiring: store, TAP client, registry, tracker and HTTP listener.
//!
//! Startup order matters. The registry is reconciled with the store before
//! the tracker's first cycle and before the listener accepts requests, so
//! jobs left in flight by a previous process are watched again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use penrose_store::{MemoryStore, ResultStore, StoreError};
use penrose_tap::TapClient;
use penrose_tracker::{JobRegistry, JobTracker, reconcile};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError, StorageConfig};
use crate::error::ServerError;
use crate::rest::{AppState, rest_router};

/// Open the configured result store.
///
/// SQLite schema provisioning happens on first use; call
/// [`ResultStore::health_check`] to force it.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ResultStore>, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            warn!(
                "Using the in-memory result store; jobs in flight are lost on restart and \
                 restart recovery is disabled"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
        "sqlite" => {
            let path = config.path.as_ref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "storage.path is required for the sqlite backend".to_string(),
                )
            })?;
            let store = penrose_store::SqliteStore::open(path)?;
            info!(path = %path.display(), "Opened SQLite result store");
            Ok(Arc::new(store))
        }
        other => Err(StoreError::Storage(format!("Unknown storage backend: {other}")).into()),
    }
}

/// Run the server until `shutdown` resolves or the tracker stops on its own.
pub async fn run<F>(config: Config, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = open_store(&config.storage)?;
    store.health_check().await?;

    let query = Arc::new(TapClient::with_config(config.tap_client_config())?);
    info!(base_url = %query.base_url(), "Gaia TAP client ready");

    let registry = Arc::new(JobRegistry::new());
    reconcile(&*store, &registry).await?;

    let tracker = Arc::new(JobTracker::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        query.clone(),
        config.tracker_config(),
    ));
    let token = CancellationToken::new();
    let tracker_handle = tracker.spawn(token.clone());

    let state = AppState::new(store, query, registry).with_api_key(config.server.api_key.clone());
    if state.auth.is_enabled() {
        info!("API key authentication enabled");
    } else {
        warn!("No API key configured (PENROSE_API_KEY); job routes are unauthenticated");
    }
    let router = rest_router(state, &config.server.cors_origins);

    let addr = config.server_address()?;
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, cors_origins = %config.server.cors_origins, "Penrose server listening");

    serve(
        listener,
        router,
        tracker_handle,
        token,
        shutdown,
        config.shutdown_timeout(),
    )
    .await
}

/// Serve `router` alongside a running tracker.
///
/// Either side ends both: `shutdown` cancels the tracker after the listener
/// drains, and a tracker exit (for instance on a fatal fault) triggers a
/// graceful HTTP shutdown. The tracker's own result is returned.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    tracker: JoinHandle<penrose_tracker::Result<()>>,
    token: CancellationToken,
    shutdown: F,
    shutdown_timeout: Duration,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            let result = tracker.await;
            token.cancel();
            result
        })
    };

    let graceful = {
        let token = token.clone();
        async move {
            tokio::select! {
                () = shutdown => info!("Shutdown signal received"),
                () = token.cancelled() => warn!("Job tracker stopped, shutting down HTTP server"),
            }
            token.cancel();
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful)
        .await?;
    token.cancel();

    match tokio::time::timeout(shutdown_timeout, watcher).await {
        Err(_) => Err(ServerError::ShutdownTimeout(shutdown_timeout)),
        Ok(Err(join)) => Err(ServerError::TrackerPanicked(join.to_string())),
        Ok(Ok(Err(join))) => Err(ServerError::TrackerPanicked(join.to_string())),
        Ok(Ok(Ok(Err(fault)))) => {
            error!(error = %fault, "Job tracker stopped on a fatal fault");
            Err(fault.into())
        }
        Ok(Ok(Ok(Ok(())))) => {
            info!("Job tracker stopped");
            Ok(())
        }
    }
}
