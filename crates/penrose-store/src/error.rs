//! Error types for the result store.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in a result store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with the same id already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A job id is not a hyphenated UUID.
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    /// Referenced job does not exist.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A result chunk exceeds the transactional batch limit.
    #[error("Result chunk of {size} records exceeds the limit of {limit}")]
    ChunkTooLarge { size: usize, limit: usize },

    /// A result chunk or the closing status upsert failed.
    ///
    /// `chunk` is the zero-based index of the failed chunk; a value equal to
    /// the number of chunks means every chunk was written and the status
    /// update failed.
    #[error("Result batch failed at chunk {chunk}: {source}")]
    BatchFailed {
        chunk: usize,
        #[source]
        source: Box<StoreError>,
    },

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failed_names_chunk_and_cause() {
        let err = StoreError::BatchFailed {
            chunk: 1,
            source: Box::new(StoreError::Storage("disk full".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("chunk 1"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_chunk_too_large_display() {
        let err = StoreError::ChunkTooLarge {
            size: 101,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "Result chunk of 101 records exceeds the limit of 100"
        );
    }
}
