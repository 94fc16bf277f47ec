//! Background tracking of asynchronous Gaia TAP jobs.
//!
//! - [`JobRegistry`]: the in-memory set of jobs currently being watched
//! - [`JobTracker`]: the polling loop that persists results of finished jobs
//! - [`reconcile`]: re-seeds the registry from the store at startup
//! - [`Metrics`]: Prometheus counters shared with the HTTP API
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use penrose_tracker::{JobRegistry, JobTracker, TrackerConfig, reconcile};
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = Arc::new(JobRegistry::new());
//! reconcile(store.as_ref(), &registry).await?;
//!
//! let tracker = Arc::new(JobTracker::new(registry, store, tap, TrackerConfig::default()));
//! let token = CancellationToken::new();
//! let handle = tracker.spawn(token.clone());
//! // ... later
//! token.cancel();
//! handle.await??;
//! ```

pub mod error;
pub mod metrics;
mod recovery;
mod registry;
mod tracker;

pub use error::{Result, TrackerError};
pub use metrics::Metrics;
pub use recovery::reconcile;
pub use registry::JobRegistry;
pub use tracker::{CycleReport, JobTracker, TrackerConfig};
