//! The background job tracker.
//!
//! Once per poll interval the tracker takes a snapshot of the registry and,
//! for every watched source independently, asks the query service for the
//! job's status:
//!
//! ```text
//!   Pending / Executing ──→ leave the entry, look again next cycle
//!   Error               ──→ stored job := Error, entry removed
//!   Completed           ──→ fetch rows, write them in chunks,
//!                           stored job := Completed, entry removed
//! ```
//!
//! Status checks, result downloads and store hiccups are retried on the next
//! cycle without touching the job or the registry. A registered source with
//! no stored job, or a result write that fails halfway, is a fatal fault: the
//! rest of the cycle still runs, then [`JobTracker::run`] returns the fault so
//! the host can stop. Result record ids are deterministic, so reprocessing a
//! half-written job after a restart overwrites rather than duplicates.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use penrose_store::{JobStatus, ResultStore, StarRecord};
use penrose_tap::{JobUrl, QueryService, QueryStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, TrackerError};
use crate::metrics::Metrics;
use crate::registry::JobRegistry;

/// Tracker tuning.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Maximum number of jobs processed concurrently within one cycle.
    pub max_concurrent_polls: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_concurrent_polls: 4,
        }
    }
}

/// What happened to one registry entry during a cycle.
#[derive(Debug)]
enum Outcome {
    StillRunning,
    Completed { rows: usize },
    Errored,
}

/// Summary of one tracker cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Entries in the snapshot.
    pub polled: usize,
    pub still_running: usize,
    pub completed: usize,
    pub errored: usize,
    /// Per-job failures left for the next cycle.
    pub transient_failures: usize,
    /// Fatal faults; any entry here stops [`JobTracker::run`].
    pub faults: Vec<TrackerError>,
}

impl CycleReport {
    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }
}

/// Polls watched jobs and persists their results.
pub struct JobTracker {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ResultStore>,
    query: Arc<dyn QueryService>,
    config: TrackerConfig,
    metrics: Metrics,
}

impl JobTracker {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn ResultStore>,
        query: Arc<dyn QueryService>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            registry,
            store,
            query,
            config,
            metrics: Metrics::new(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(token).await })
    }

    /// Run cycles until cancelled or until a cycle reports a fatal fault.
    ///
    /// Cancellation interrupts both the sleep between cycles and a cycle in
    /// progress.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_concurrent_polls = self.config.max_concurrent_polls,
            "Job tracker started"
        );

        loop {
            let report = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Job tracker cancelled during cycle");
                    return Ok(());
                }
                report = self.run_cycle() => report,
            };

            if let Some(fault) = report.faults.into_iter().next() {
                error!(error = %fault, "Job tracker stopping on fatal fault");
                return Err(fault);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Job tracker cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Process one snapshot of the registry.
    pub async fn run_cycle(&self) -> CycleReport {
        let snapshot = self.registry.snapshot();
        let mut report = CycleReport {
            polled: snapshot.len(),
            ..CycleReport::default()
        };
        self.metrics.record_cycle();

        let concurrency = self.config.max_concurrent_polls.max(1);
        let mut outcomes = futures::stream::iter(snapshot)
            .map(|(source_id, job_url)| async move {
                let outcome = self.process(&source_id, &job_url).await;
                (source_id, outcome)
            })
            .buffer_unordered(concurrency);

        while let Some((source_id, outcome)) = outcomes.next().await {
            match outcome {
                Ok(Outcome::StillRunning) => report.still_running += 1,
                Ok(Outcome::Completed { rows }) => {
                    report.completed += 1;
                    self.metrics.record_job_completed(rows);
                }
                Ok(Outcome::Errored) => {
                    report.errored += 1;
                    self.metrics.record_job_errored();
                }
                Err(e) if e.is_fatal() => {
                    error!(source_id = %source_id, error = %e, "Fatal tracker fault");
                    self.metrics.record_fault();
                    report.faults.push(e);
                }
                Err(e) => {
                    warn!(source_id = %source_id, error = %e, "Job check failed, retrying next cycle");
                    self.metrics.record_transient_failure(stage(&e));
                    report.transient_failures += 1;
                }
            }
        }

        self.metrics.set_registry_size(self.registry.len());
        debug!(
            polled = report.polled,
            still_running = report.still_running,
            completed = report.completed,
            errored = report.errored,
            transient_failures = report.transient_failures,
            faults = report.faults.len(),
            "Tracker cycle finished"
        );
        report
    }

    /// Advance a single watched job.
    #[instrument(skip(self, job_url), fields(job_url = %job_url))]
    async fn process(&self, source_id: &str, job_url: &JobUrl) -> Result<Outcome> {
        let status = self.query.check_status(job_url).await?;

        match status {
            QueryStatus::Pending | QueryStatus::Executing => {
                debug!(?status, "Job still running");
                Ok(Outcome::StillRunning)
            }
            QueryStatus::Error => {
                let mut job = self.stored_job(source_id, job_url).await?;
                job.set_status(JobStatus::Error);
                self.store.update_job(&job).await?;
                self.registry.remove(source_id);
                info!(job_id = %job.id, "Remote job failed, marked as error");
                Ok(Outcome::Errored)
            }
            QueryStatus::Completed => {
                let mut job = self.stored_job(source_id, job_url).await?;
                let rows = self.query.fetch_results(job_url).await?;

                let records: Vec<StarRecord> = rows
                    .into_iter()
                    .enumerate()
                    .map(|(index, row)| StarRecord::for_row(job.id, index, row))
                    .collect();

                self.store
                    .add_result_batch(&records, &mut job)
                    .await
                    .map_err(|source| TrackerError::PartialWrite {
                        source_id: source_id.to_string(),
                        source,
                    })?;

                self.registry.remove(source_id);
                info!(job_id = %job.id, rows = records.len(), "Job completed, results stored");
                Ok(Outcome::Completed {
                    rows: records.len(),
                })
            }
        }
    }

    /// Load the stored job for a watched source.
    async fn stored_job(&self, source_id: &str, job_url: &JobUrl) -> Result<penrose_store::Job> {
        self.store
            .get_job(source_id)
            .await?
            .ok_or_else(|| TrackerError::MissingJob {
                source_id: source_id.to_string(),
                job_url: job_url.to_string(),
            })
    }
}

/// Metric label for a retryable failure.
fn stage(err: &TrackerError) -> &'static str {
    match err {
        TrackerError::Query(_) => "query",
        TrackerError::Store(_) => "store",
        TrackerError::MissingJob { .. } | TrackerError::PartialWrite { .. } => "fatal",
    }
}
