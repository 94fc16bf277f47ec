//! Remote job identity and status.
//!
//! The UWS protocol reports a job's phase as free text. The tracker only
//! cares about four states, so every documented UWS phase is folded onto
//! [`QueryStatus`]:
//!
//! ```text
//!   PENDING, QUEUED, HELD, SUSPENDED ──→ Pending
//!   EXECUTING                        ──→ Executing
//!   COMPLETED                        ──→ Completed
//!   ERROR, ABORTED, ARCHIVED         ──→ Error
//! ```
//!
//! `UNKNOWN` and anything else is rejected with [`TapError::UnknownPhase`].

use serde::{Deserialize, Serialize};

use crate::error::{TapError, TapResult};

/// Absolute URL of a remote UWS job resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobUrl(pub String);

impl JobUrl {
    /// Wrap an absolute job URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of the phase sub-resource, used to start the job.
    pub fn phase_url(&self) -> String {
        format!("{}/phase", self.0.trim_end_matches('/'))
    }

    /// URL of the default result of the job.
    pub fn result_url(&self) -> String {
        format!("{}/results/result", self.0.trim_end_matches('/'))
    }
}

impl std::fmt::Display for JobUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobUrl {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a remote query job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    /// Accepted but not yet running.
    Pending,
    /// Running on the remote service.
    Executing,
    /// Finished; results can be fetched.
    Completed,
    /// Finished without usable results.
    Error,
}

impl QueryStatus {
    /// Parse a UWS phase string.
    pub fn from_phase(phase: &str) -> TapResult<Self> {
        match phase.trim() {
            "PENDING" | "QUEUED" | "HELD" | "SUSPENDED" => Ok(QueryStatus::Pending),
            "EXECUTING" => Ok(QueryStatus::Executing),
            "COMPLETED" => Ok(QueryStatus::Completed),
            "ERROR" | "ABORTED" | "ARCHIVED" => Ok(QueryStatus::Error),
            other => Err(TapError::UnknownPhase(other.to_string())),
        }
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::Pending => write!(f, "Pending"),
            QueryStatus::Executing => write!(f, "Executing"),
            QueryStatus::Completed => write!(f, "Completed"),
            QueryStatus::Error => write!(f, "Error"),
        }
    }
}
