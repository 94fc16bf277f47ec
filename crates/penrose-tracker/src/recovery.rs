//! Startup reconciliation of the registry with the store.

use penrose_store::{JobFilter, ResultStore};
use penrose_tap::JobUrl;
use tracing::{debug, info};

use crate::error::Result;
use crate::registry::JobRegistry;

/// Register every stored job that has not reached a terminal status.
///
/// Must run before the tracker's first cycle; the registry is not persisted,
/// so this is the only way in-flight jobs survive a restart. Returns the
/// number of entries added.
pub async fn reconcile(store: &dyn ResultStore, registry: &JobRegistry) -> Result<usize> {
    let jobs = store.list_jobs(&JobFilter::active()).await?;

    let mut seeded = 0;
    for job in jobs {
        if registry.add(job.source_id.clone(), JobUrl::new(job.job_url.clone())) {
            debug!(source_id = %job.source_id, job_id = %job.id, "Re-registered in-flight job");
            seeded += 1;
        }
    }

    info!(seeded, "Registry reconciled with store");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use penrose_store::{Job, JobStatus, MemoryStore};

    #[tokio::test]
    async fn test_seeds_only_active_jobs() {
        let store = MemoryStore::new();
        for (source, status) in [
            ("1", JobStatus::Pending),
            ("2", JobStatus::Executing),
            ("3", JobStatus::Completed),
            ("4", JobStatus::Error),
        ] {
            let mut job = Job::new(source, format!("https://tap/async/{source}"), "n", 0.0);
            job.status = status;
            store.create_job(&job).await.unwrap();
        }

        let registry = JobRegistry::new();
        let seeded = reconcile(&store, &registry).await.unwrap();

        assert_eq!(seeded, 2);
        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot,
            vec![
                ("1".to_string(), JobUrl::from("https://tap/async/1")),
                ("2".to_string(), JobUrl::from("https://tap/async/2")),
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_entries_are_kept() {
        let store = MemoryStore::new();
        let job = Job::new("1", "https://tap/async/stored", "n", 0.0);
        store.create_job(&job).await.unwrap();

        let registry = JobRegistry::new();
        registry.add("1", JobUrl::from("https://tap/async/live"));

        assert_eq!(reconcile(&store, &registry).await.unwrap(), 0);
        assert_eq!(registry.get("1"), Some(JobUrl::from("https://tap/async/live")));
    }
}
