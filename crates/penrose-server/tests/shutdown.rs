//! Coordinated shutdown of the HTTP listener and the job tracker.

use std::sync::Arc;
use std::time::Duration;

use penrose_server::config::StorageConfig;
use penrose_server::{AppState, ServerError, open_store, rest_router, serve};
use penrose_store::{Job, ResultStore};
use penrose_tap::{JobUrl, QueryService, QueryStatus, SourceRow, TapResult};
use penrose_tracker::{JobRegistry, JobTracker, TrackerConfig, TrackerError};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Every job is already complete with no rows.
struct InstantTap;

#[async_trait::async_trait]
impl QueryService for InstantTap {
    async fn submit(&self, source_id: &str) -> TapResult<JobUrl> {
        Ok(JobUrl::new(format!("https://tap.test/async/{source_id}")))
    }

    async fn check_status(&self, _job_url: &JobUrl) -> TapResult<QueryStatus> {
        Ok(QueryStatus::Completed)
    }

    async fn fetch_results(&self, _job_url: &JobUrl) -> TapResult<Vec<SourceRow>> {
        Ok(Vec::new())
    }
}

fn router(store: Arc<dyn ResultStore>, registry: Arc<JobRegistry>) -> axum::Router {
    rest_router(
        AppState::new(store, Arc::new(InstantTap), registry),
        "*",
    )
}

async fn listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

#[tokio::test]
async fn test_shutdown_signal_stops_tracker_cleanly() {
    let store = open_store(&StorageConfig::default()).unwrap();
    let registry = Arc::new(JobRegistry::new());
    let tracker = Arc::new(JobTracker::new(
        registry.clone(),
        store.clone(),
        Arc::new(InstantTap),
        TrackerConfig {
            poll_interval: Duration::from_millis(20),
            max_concurrent_polls: 1,
        },
    ));
    let token = CancellationToken::new();
    let handle = tracker.spawn(token.clone());

    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(
        listener().await,
        router(store, registry),
        handle,
        token.clone(),
        async move {
            let _ = rx.await;
        },
        Duration::from_secs(5),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = server.await.unwrap();
    assert!(result.is_ok(), "unexpected error: {result:?}");
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_fatal_tracker_fault_stops_server() {
    let store = open_store(&StorageConfig::default()).unwrap();
    let registry = Arc::new(JobRegistry::new());

    // Registered but never stored: the first cycle hits a consistency fault.
    registry.add("42", JobUrl::from("https://tap.test/async/42"));

    let tracker = Arc::new(JobTracker::new(
        registry.clone(),
        store.clone(),
        Arc::new(InstantTap),
        TrackerConfig::default(),
    ));
    let token = CancellationToken::new();
    let handle = tracker.spawn(token.clone());

    let result = serve(
        listener().await,
        router(store, registry),
        handle,
        token.clone(),
        std::future::pending(),
        Duration::from_secs(5),
    )
    .await;

    assert!(matches!(
        result,
        Err(ServerError::Tracker(TrackerError::MissingJob { ref source_id, .. })) if source_id == "42"
    ));
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_open_store_rejects_unknown_backend() {
    let config = StorageConfig {
        backend: "cosmos".to_string(),
        path: None,
    };
    assert!(open_store(&config).is_err());
}

/// Collects formatted log output.
#[derive(Clone, Default)]
struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_memory_backend_warns_recovery_disabled() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        open_store(&StorageConfig::default()).unwrap();
    });

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("WARN"), "{output}");
    assert!(output.contains("restart recovery is disabled"), "{output}");
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: "sqlite".to_string(),
        path: Some(dir.path().join("penrose.db")),
    };

    let job = Job::new("42", "https://tap.test/async/42", "TRAPPIST-1 e", 80.2);
    {
        let store = open_store(&config).unwrap();
        store.health_check().await.unwrap();
        store.create_job(&job).await.unwrap();
    }

    let store = open_store(&config).unwrap();
    let registry = JobRegistry::new();
    let seeded = penrose_tracker::reconcile(&*store, &registry).await.unwrap();
    assert_eq!(seeded, 1);
    assert_eq!(registry.get("42"), Some(JobUrl::from("https://tap.test/async/42")));
}
