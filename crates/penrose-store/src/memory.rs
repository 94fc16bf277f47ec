//! In-memory result store (no persistence).
//!
//! This implementation uses `Arc<RwLock<FxHashMap>>` for thread-safe in-memory
//! storage. Everything is lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::model::{Constellation, Job, JobFilter, JobId, PartitionKey, StarRecord};
use crate::{ResultStore, validate_chunk};

/// In-memory result store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<RwLock<FxHashMap<JobId, Job>>>,
    /// Result records per partition, keyed by row index.
    results: Arc<RwLock<FxHashMap<PartitionKey, BTreeMap<usize, StarRecord>>>>,
    constellations: Arc<RwLock<FxHashMap<JobId, Vec<Constellation>>>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn get_job(&self, source_id: &str) -> Result<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.source_id == source_id)
            .max_by_key(|job| (job.created_at, job.id))
            .cloned())
    }

    async fn get_job_by_id(&self, job_id: &JobId) -> Result<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(job_id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;

        let mut result: Vec<Job> = jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();

        result.sort_by_key(|job| (job.created_at, job.id));
        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }

        Ok(result)
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn insert_result_chunk(
        &self,
        partition: &PartitionKey,
        records: &[StarRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_chunk(partition, records)?;

        let mut results = self.results.write().await;
        let rows = results.entry(partition.clone()).or_default();
        for record in records {
            rows.insert(record.index, record.clone());
        }
        Ok(())
    }

    async fn count_results(&self, job_id: &JobId) -> Result<usize> {
        let results = self.results.read().await;
        Ok(results
            .get(&job_id.partition_key())
            .map_or(0, BTreeMap::len))
    }

    async fn list_results(
        &self,
        job_id: &JobId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StarRecord>> {
        let results = self.results.read().await;
        Ok(results
            .get(&job_id.partition_key())
            .map(|rows| rows.values().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_constellation(&self, constellation: &Constellation) -> Result<()> {
        if !self.jobs.read().await.contains_key(&constellation.job_id) {
            return Err(StoreError::JobNotFound(constellation.job_id.to_string()));
        }

        let mut constellations = self.constellations.write().await;
        let entries = constellations.entry(constellation.job_id).or_default();
        if entries.iter().any(|c| c.id == constellation.id) {
            return Err(StoreError::Conflict(format!(
                "constellation {} already exists",
                constellation.id
            )));
        }
        entries.push(constellation.clone());
        Ok(())
    }

    async fn list_constellations(&self, job_id: &JobId) -> Result<Vec<Constellation>> {
        let constellations = self.constellations.read().await;
        Ok(constellations.get(job_id).cloned().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstellationPoint, JobStatus, StarData};
    use crate::RESULT_CHUNK_SIZE;

    fn rows(job: &Job, n: usize) -> Vec<StarRecord> {
        (0..n)
            .map(|i| {
                let data = StarData::from([("source_id".to_string(), i.to_string())]);
                StarRecord::for_row(job.id, i, data)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let store = MemoryStore::new();
        let job = Job::new("12345", "https://tap/async/1", "Proxima b", 768.07);

        store.create_job(&job).await.unwrap();

        let by_source = store.get_job("12345").await.unwrap().unwrap();
        assert_eq!(by_source.id, job.id);
        let by_id = store.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(by_id, job);
        assert!(store.get_job("99999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_id_conflicts() {
        let store = MemoryStore::new();
        let job = Job::new("1", "u", "n", 0.0);
        store.create_job(&job).await.unwrap();
        assert!(matches!(
            store.create_job(&job).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_get_job_returns_latest_for_source() {
        let store = MemoryStore::new();
        let mut old = Job::new("1", "u1", "n", 0.0);
        old.set_status(JobStatus::Error);
        old.created_at -= chrono::Duration::seconds(60);
        let new = Job::new("1", "u2", "n", 0.0);
        store.create_job(&old).await.unwrap();
        store.create_job(&new).await.unwrap();

        assert_eq!(store.get_job("1").await.unwrap().unwrap().id, new.id);
    }

    #[tokio::test]
    async fn test_list_jobs_filter_and_order() {
        let store = MemoryStore::new();
        let mut jobs = Vec::new();
        for (i, status) in [
            JobStatus::Pending,
            JobStatus::Executing,
            JobStatus::Completed,
            JobStatus::Error,
        ]
        .into_iter()
        .enumerate()
        {
            let mut job = Job::new(i.to_string(), "u", "n", 0.0);
            job.status = status;
            job.created_at += chrono::Duration::seconds(i as i64);
            store.create_job(&job).await.unwrap();
            jobs.push(job);
        }

        let active = store.list_jobs(&JobFilter::active()).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].source_id, "0");
        assert_eq!(active[1].source_id, "1");

        let all = store.list_jobs(&JobFilter::new().with_limit(3)).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].source_id, "2");
    }

    #[tokio::test]
    async fn test_add_result_batch_completes_job() {
        let store = MemoryStore::new();
        let mut job = Job::new("1", "u", "n", 0.0);
        store.create_job(&job).await.unwrap();

        let records = rows(&job, 250);
        store.add_result_batch(&records, &mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        let stored = store.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(store.count_results(&job.id).await.unwrap(), 250);

        let page = store.list_results(&job.id, 200, 1000).await.unwrap();
        assert_eq!(page.len(), 50);
        assert_eq!(page[0].index, 200);
    }

    #[tokio::test]
    async fn test_reinserting_results_is_idempotent() {
        let store = MemoryStore::new();
        let mut job = Job::new("1", "u", "n", 0.0);
        store.create_job(&job).await.unwrap();

        let records = rows(&job, 120);
        store
            .insert_result_chunk(&job.partition_key(), &records[..100])
            .await
            .unwrap();
        store.add_result_batch(&records, &mut job).await.unwrap();

        assert_eq!(store.count_results(&job.id).await.unwrap(), 120);
    }

    #[tokio::test]
    async fn test_chunk_limits() {
        let store = MemoryStore::new();
        let job = Job::new("1", "u", "n", 0.0);
        let key = job.partition_key();

        store.insert_result_chunk(&key, &[]).await.unwrap();

        let too_many = rows(&job, RESULT_CHUNK_SIZE + 1);
        assert!(matches!(
            store.insert_result_chunk(&key, &too_many).await,
            Err(StoreError::ChunkTooLarge { size: 101, .. })
        ));

        let other = Job::new("2", "u", "n", 0.0);
        let mut mixed = rows(&job, 2);
        mixed.extend(rows(&other, 1));
        assert!(store.insert_result_chunk(&key, &mixed).await.is_err());
        assert_eq!(store.count_results(&job.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_constellations() {
        let store = MemoryStore::new();
        let job = Job::new("1", "u", "n", 0.0);

        let constellation = Constellation::new(
            job.id,
            "The Kettle",
            vec![ConstellationPoint {
                source_id: "42".into(),
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }],
        );
        assert!(matches!(
            store.create_constellation(&constellation).await,
            Err(StoreError::JobNotFound(_))
        ));

        store.create_job(&job).await.unwrap();
        store.create_constellation(&constellation).await.unwrap();

        let listed = store.list_constellations(&job.id).await.unwrap();
        assert_eq!(listed, vec![constellation]);
    }
}
