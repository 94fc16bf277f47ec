//! Prometheus metrics for the job tracker and the HTTP API.
//!
//! This module tracks:
//! - Job submissions, completions and errors
//! - Result rows persisted
//! - Tracker cycles, transient poll failures and fatal faults
//! - Registry size

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    /// Counter for jobs submitted to the query service
    pub static ref JOBS_SUBMITTED: Counter = register_counter!(
        "penrose_jobs_submitted_total",
        "Total number of jobs submitted to the query service"
    )
    .unwrap();

    /// Counter for jobs whose results were persisted
    pub static ref JOBS_COMPLETED: Counter = register_counter!(
        "penrose_jobs_completed_total",
        "Total number of jobs completed with persisted results"
    )
    .unwrap();

    /// Counter for jobs the query service reported as failed
    pub static ref JOBS_ERRORED: Counter = register_counter!(
        "penrose_jobs_errored_total",
        "Total number of jobs reported as failed by the query service"
    )
    .unwrap();

    /// Counter for result rows written to the store
    pub static ref RESULT_ROWS: Counter = register_counter!(
        "penrose_result_rows_written_total",
        "Total number of result rows written to the store"
    )
    .unwrap();

    /// Counter for tracker cycles
    pub static ref TRACKER_CYCLES: Counter = register_counter!(
        "penrose_tracker_cycles_total",
        "Total number of tracker polling cycles"
    )
    .unwrap();

    /// Counter for per-job failures retried on the next cycle, labeled by stage
    pub static ref TRANSIENT_FAILURES: CounterVec = register_counter_vec!(
        "penrose_tracker_transient_failures_total",
        "Per-job failures that are retried on the next cycle",
        &["stage"]
    )
    .unwrap();

    /// Counter for fatal tracker faults
    pub static ref TRACKER_FAULTS: Counter = register_counter!(
        "penrose_tracker_faults_total",
        "Total number of fatal tracker faults"
    )
    .unwrap();

    /// Gauge for jobs currently being watched
    pub static ref REGISTRY_SIZE: Gauge = register_gauge!(
        "penrose_registry_size",
        "Number of jobs currently watched by the tracker"
    )
    .unwrap();
}

/// Metrics aggregator for the tracker and API.
///
/// The actual metrics are stored in global static variables (`lazy_static`).
#[derive(Clone, Debug)]
pub struct Metrics;

impl Metrics {
    /// Create a new Metrics instance.
    pub fn new() -> Self {
        Self
    }

    pub fn record_job_submitted(&self) {
        JOBS_SUBMITTED.inc();
    }

    /// Record a job whose `rows` results were persisted.
    pub fn record_job_completed(&self, rows: usize) {
        JOBS_COMPLETED.inc();
        RESULT_ROWS.inc_by(rows as f64);
    }

    pub fn record_job_errored(&self) {
        JOBS_ERRORED.inc();
    }

    pub fn record_cycle(&self) {
        TRACKER_CYCLES.inc();
    }

    /// Record a retryable failure at `stage` (`status`, `results`, `store`).
    pub fn record_transient_failure(&self, stage: &str) {
        TRANSIENT_FAILURES.with_label_values(&[stage]).inc();
    }

    pub fn record_fault(&self) {
        TRACKER_FAULTS.inc();
    }

    pub fn set_registry_size(&self, size: usize) {
        REGISTRY_SIZE.set(size as f64);
    }

    /// Get current metrics as Prometheus text format.
    pub fn export(&self) -> Result<String, std::fmt::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|_| std::fmt::Error)?;

        String::from_utf8(buffer).map_err(|_| std::fmt::Error)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
