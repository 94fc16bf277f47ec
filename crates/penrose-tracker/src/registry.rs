//! In-memory registry of jobs the tracker is watching.
//!
//! The registry maps a Gaia source id to the URL of its remote UWS job. It is
//! not persisted; after a restart it is re-seeded from the store by
//! [`reconcile`](crate::reconcile).

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use penrose_tap::JobUrl;

/// Thread-safe `source_id → job_url` map shared by request handlers and the
/// tracker loop.
///
/// Every operation takes the lock once, so `add`, `remove` and `snapshot`
/// are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: RwLock<FxHashMap<String, JobUrl>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job unless the source is already being watched.
    ///
    /// Returns `true` if the entry was inserted; an existing entry keeps its
    /// original URL.
    pub fn add(&self, source_id: impl Into<String>, job_url: JobUrl) -> bool {
        let mut entries = self.entries.write();
        match entries.entry(source_id.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(job_url);
                true
            }
        }
    }

    /// Stop watching a source. Returns `true` if an entry was removed.
    pub fn remove(&self, source_id: &str) -> bool {
        self.entries.write().remove(source_id).is_some()
    }

    /// Owned copy of all entries, sorted by source id.
    pub fn snapshot(&self) -> Vec<(String, JobUrl)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(source_id, url)| (source_id.clone(), url.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.entries.read().contains_key(source_id)
    }

    /// URL registered for a source, if any.
    pub fn get(&self, source_id: &str) -> Option<JobUrl> {
        self.entries.read().get(source_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_registration_wins() {
        let registry = JobRegistry::new();
        assert!(registry.add("12345", JobUrl::from("https://tap/async/a")));
        assert!(!registry.add("12345", JobUrl::from("https://tap/async/b")));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("12345"),
            Some(JobUrl::from("https://tap/async/a"))
        );
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = JobRegistry::new();
        registry.add("1", JobUrl::from("u1"));

        assert!(!registry.remove("2"));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("1"));
        assert!(!registry.remove("1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let registry = JobRegistry::new();
        registry.add("b", JobUrl::from("u2"));
        registry.add("a", JobUrl::from("u1"));

        let snapshot = registry.snapshot();
        registry.remove("a");
        registry.add("c", JobUrl::from("u3"));

        assert_eq!(
            snapshot,
            vec![
                ("a".to_string(), JobUrl::from("u1")),
                ("b".to_string(), JobUrl::from("u2")),
            ]
        );
        assert!(!registry.contains("a"));
        assert!(registry.contains("c"));
    }

    #[test]
    fn test_concurrent_adds() {
        let registry = Arc::new(JobRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        registry.add(format!("{i}"), JobUrl::new(format!("thread-{t}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 100);
    }
}
