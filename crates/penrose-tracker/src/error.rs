//! Error types for the job tracker.

use penrose_store::StoreError;
use penrose_tap::TapError;
use thiserror::Error;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors raised while tracking jobs.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A watched source has no stored job. The create path and the registry
    /// have diverged.
    #[error("No stored job for registered source {source_id} ({job_url})")]
    MissingJob { source_id: String, job_url: String },

    /// Results were only partly persisted, or the job could not be marked
    /// completed after its results were written.
    #[error("Partial result write for source {source_id}: {source}")]
    PartialWrite {
        source_id: String,
        #[source]
        source: StoreError,
    },

    /// Store call failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// External query service call failed.
    #[error("Query service error: {0}")]
    Query(#[from] TapError),
}

impl TrackerError {
    /// Whether the error breaks a store/registry invariant and must stop the
    /// tracker. Everything else is retried on the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackerError::MissingJob { .. } | TrackerError::PartialWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let missing = TrackerError::MissingJob {
            source_id: "12345".into(),
            job_url: "https://tap/async/1".into(),
        };
        assert!(missing.is_fatal());
        assert!(missing.to_string().contains("12345"));

        let partial = TrackerError::PartialWrite {
            source_id: "12345".into(),
            source: StoreError::Storage("disk full".into()),
        };
        assert!(partial.is_fatal());

        let transient = TrackerError::Query(TapError::UnknownPhase("UNKNOWN".into()));
        assert!(!transient.is_fatal());
        assert!(!TrackerError::Store(StoreError::Storage("busy".into())).is_fatal());
    }
}
