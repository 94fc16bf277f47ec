//! Stored document types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Unique identifier of a stored job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id from its hyphenated string form.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| StoreError::InvalidJobId(format!("{s}: {e}")))
    }

    /// Partition key shared by the job document and all of its results.
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey(self.0.to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grouping key co-locating a job with its result records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(pub String);

impl PartitionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a stored job.
///
/// ```text
///   Pending ──→ Executing ──→ Completed
///      │            │
///      └────────────┴──────→ Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Executing,
    Completed,
    Error,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Executing,
        JobStatus::Completed,
        JobStatus::Error,
    ];

    /// Check if no further tracker action will happen for this job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Check if the job is still being watched.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Executing => "executing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Parse a canonical storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "executing" => Some(JobStatus::Executing),
            "completed" => Some(JobStatus::Completed),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external query submitted for a Gaia source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub source_id: String,
    pub job_url: String,
    pub status: JobStatus,
    /// Exoplanet name shown to users.
    pub name: String,
    /// Parallax of the host star as seen from Earth, in milliarcseconds.
    pub parallax: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a freshly submitted job.
    pub fn new(
        source_id: impl Into<String>,
        job_url: impl Into<String>,
        name: impl Into<String>,
        parallax: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_id: source_id.into(),
            job_url: job_url.into(),
            status: JobStatus::Pending,
            name: name.into(),
            parallax,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        self.id.partition_key()
    }

    /// Move the job to `status`, touching `updated_at`.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Field values of one star, in the column order of the query output.
pub type StarData = IndexMap<String, String>;

/// One row of a job's query output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarRecord {
    /// `"{job_id}:{index}"`; stable across retries of the same result set.
    pub id: String,
    pub job_id: JobId,
    /// Position of the row in the result table.
    pub index: usize,
    pub star_data: StarData,
}

impl StarRecord {
    /// Build the record for row `index` of a job's results.
    pub fn for_row(job_id: JobId, index: usize, star_data: StarData) -> Self {
        Self {
            id: format!("{job_id}:{index}"),
            job_id,
            index,
            star_data,
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        self.job_id.partition_key()
    }
}

/// A point of a user-drawn constellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationPoint {
    pub source_id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A user-drawn figure over the stars of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constellation {
    pub id: Uuid,
    pub job_id: JobId,
    pub name: String,
    pub votes: u32,
    pub points: Vec<ConstellationPoint>,
}

impl Constellation {
    /// Create a constellation with no votes.
    pub fn new(job_id: JobId, name: impl Into<String>, points: Vec<ConstellationPoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            name: name.into(),
            votes: 0,
            points,
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        self.job_id.partition_key()
    }
}

/// Filter for querying jobs.
#[derive(Clone, Debug, Default)]
pub struct JobFilter {
    /// Accepted statuses; empty means any.
    pub statuses: Vec<JobStatus>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs the tracker still has to watch.
    pub fn active() -> Self {
        Self::new().with_statuses(JobStatus::ALL.into_iter().filter(JobStatus::is_active))
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether `job` passes the status filter.
    pub fn matches(&self, job: &Job) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&job.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new("12345", "https://tap/async/1", "Proxima b", 768.07);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.partition_key().as_str(), job.id.to_string());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_status_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Executing,
            JobStatus::Completed,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
        assert_eq!(JobStatus::parse("PENDING"), None);
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        assert_eq!(JobId::parse(&id.to_string()).unwrap(), id);
        assert!(matches!(
            JobId::parse("not-a-uuid"),
            Err(StoreError::InvalidJobId(msg)) if msg.starts_with("not-a-uuid")
        ));
    }

    #[test]
    fn test_terminal_and_active() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Executing.is_active());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_star_record_ids_are_deterministic() {
        let job_id = JobId::new();
        let a = StarRecord::for_row(job_id, 7, StarData::new());
        let b = StarRecord::for_row(job_id, 7, StarData::new());
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, format!("{job_id}:7"));
        assert_eq!(a.partition_key(), job_id.partition_key());
    }

    #[test]
    fn test_active_filter() {
        let filter = JobFilter::active();
        assert_eq!(filter.statuses, [JobStatus::Pending, JobStatus::Executing]);
        let mut job = Job::new("1", "u", "n", 0.0);
        assert!(filter.matches(&job));
        job.set_status(JobStatus::Error);
        assert!(!filter.matches(&job));
        assert!(JobFilter::new().matches(&job));
    }
}
