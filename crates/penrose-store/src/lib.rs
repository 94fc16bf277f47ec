//! Job and result persistence for the Penrose job tracker.
//!
//! The [`ResultStore`] trait is a small document-store contract: jobs,
//! per-job result records and constellations, each grouped under the
//! partition key of the job they belong to. Two backends are provided:
//!
//! - [`MemoryStore`]: in-memory storage (no persistence)
//! - [`SqliteStore`]: SQLite documents for single-node deployments
//!
//! Result rows are written through [`ResultStore::add_result_batch`], which
//! splits them into transactional chunks of [`RESULT_CHUNK_SIZE`] records and
//! only marks the job `Completed` once every chunk has been committed.

use async_trait::async_trait;
use tracing::debug;

pub mod error;
pub mod memory;
pub mod model;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use model::{
    Constellation, ConstellationPoint, Job, JobFilter, JobId, JobStatus, PartitionKey, StarData,
    StarRecord,
};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Maximum number of records in one transactional result chunk.
pub const RESULT_CHUNK_SIZE: usize = 100;

/// Check that every record of a chunk belongs to `partition` and that the
/// chunk fits in one transaction.
pub(crate) fn validate_chunk(partition: &PartitionKey, records: &[StarRecord]) -> Result<()> {
    if records.len() > RESULT_CHUNK_SIZE {
        return Err(StoreError::ChunkTooLarge {
            size: records.len(),
            limit: RESULT_CHUNK_SIZE,
        });
    }
    if let Some(stray) = records.iter().find(|r| &r.partition_key() != partition) {
        return Err(StoreError::Storage(format!(
            "record {} does not belong to partition {}",
            stray.id, partition
        )));
    }
    Ok(())
}

/// Trait for result store backends.
///
/// Implementations must be thread-safe (Send + Sync) and support async operations.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Get the most recently created job for a Gaia source.
    async fn get_job(&self, source_id: &str) -> Result<Option<Job>>;

    /// Get a job by ID.
    async fn get_job_by_id(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// List jobs matching the filter, oldest first.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Store a new job.
    ///
    /// Fails with [`StoreError::Conflict`] if a job with the same id exists.
    async fn create_job(&self, job: &Job) -> Result<()>;

    /// Insert or replace a job document.
    async fn update_job(&self, job: &Job) -> Result<()>;

    /// Write one chunk of result records as a single transaction.
    ///
    /// Either every record becomes visible or none does. Re-inserting a
    /// record with an existing id replaces it. Empty chunks are a no-op.
    async fn insert_result_chunk(
        &self,
        partition: &PartitionKey,
        records: &[StarRecord],
    ) -> Result<()>;

    /// Persist the full result set of `job` and mark it `Completed`.
    ///
    /// Records are written in chunks of [`RESULT_CHUNK_SIZE`], one after the
    /// other, and the status is only flipped after the last chunk commits.
    /// On failure, chunks before the failing one stay committed, the job
    /// keeps its previous status and the error names the failing chunk.
    async fn add_result_batch(&self, results: &[StarRecord], job: &mut Job) -> Result<()> {
        let partition = job.partition_key();
        let chunks = results.len().div_ceil(RESULT_CHUNK_SIZE);

        for (index, chunk) in results.chunks(RESULT_CHUNK_SIZE).enumerate() {
            self.insert_result_chunk(&partition, chunk)
                .await
                .map_err(|e| StoreError::BatchFailed {
                    chunk: index,
                    source: Box::new(e),
                })?;
            debug!(
                job_id = %job.id,
                chunk = index,
                records = chunk.len(),
                "Committed result chunk"
            );
        }

        let previous = job.status;
        job.set_status(JobStatus::Completed);
        if let Err(e) = self.update_job(job).await {
            job.status = previous;
            return Err(StoreError::BatchFailed {
                chunk: chunks,
                source: Box::new(e),
            });
        }

        Ok(())
    }

    /// Number of result records stored for a job.
    async fn count_results(&self, job_id: &JobId) -> Result<usize>;

    /// A page of a job's result records in row order.
    async fn list_results(
        &self,
        job_id: &JobId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StarRecord>>;

    /// Store a new constellation for an existing job.
    async fn create_constellation(&self, constellation: &Constellation) -> Result<()>;

    /// All constellations drawn over a job's stars.
    async fn list_constellations(&self, job_id: &JobId) -> Result<Vec<Constellation>>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<()>;
}
