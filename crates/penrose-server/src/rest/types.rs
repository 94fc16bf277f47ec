//! JSON request/response types for the REST API.

use chrono::{DateTime, Utc};
use penrose_store::{Constellation, ConstellationPoint, Job, JobStatus, StarData};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Requests ──────────────────────────────────────────────────────────────

/// POST /v1/jobs
///
/// camelCase aliases keep older web clients working.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Gaia DR3 source id of the host star.
    #[serde(alias = "sourceId")]
    pub source_id: String,
    #[serde(alias = "exoplanetName")]
    pub exoplanet_name: String,
    /// Parallax of the host star as seen from Earth, in milliarcseconds.
    #[serde(alias = "parallaxFromEarth")]
    pub parallax_from_earth: f64,
}

/// GET /v1/jobs query string
#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    /// Comma-separated statuses, e.g. `pending,executing`.
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// POST /v1/exoplanets/{id}/constellations
#[derive(Debug, Deserialize)]
pub struct CreateConstellationRequest {
    pub name: String,
    #[serde(default)]
    pub points: Vec<PointBody>,
}

/// A star of a constellation, in the exoplanet's sky.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointBody {
    #[serde(alias = "sourceId")]
    pub source_id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<PointBody> for ConstellationPoint {
    fn from(p: PointBody) -> Self {
        ConstellationPoint {
            source_id: p.source_id,
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

impl From<ConstellationPoint> for PointBody {
    fn from(p: ConstellationPoint) -> Self {
        PointBody {
            source_id: p.source_id,
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────

/// GET /v1/health
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /v1/health/ready
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    /// `"ok"` or the store's error message.
    pub store: String,
    /// Jobs currently watched by the tracker.
    pub tracked_jobs: usize,
}

/// A stored job.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub source_id: String,
    pub job_url: String,
    pub status: JobStatus,
    pub name: String,
    pub parallax: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        JobResponse {
            id: job.id.0,
            source_id: job.source_id,
            job_url: job.job_url,
            status: job.status,
            name: job.name,
            parallax: job.parallax,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// GET /v1/jobs/{source_id}/status
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub source_id: String,
    /// Status reported by the Gaia archive right now.
    pub status: String,
    /// Status last persisted by the tracker.
    pub stored_status: JobStatus,
}

/// GET /v1/exoplanets item
#[derive(Debug, Serialize)]
pub struct ExoplanetSummary {
    pub id: Uuid,
    pub name: String,
    pub parallax: f64,
    pub status: JobStatus,
}

impl From<Job> for ExoplanetSummary {
    fn from(job: Job) -> Self {
        ExoplanetSummary {
            id: job.id.0,
            name: job.name,
            parallax: job.parallax,
            status: job.status,
        }
    }
}

/// One page of the star stream.
pub type StarPage = Vec<StarData>;

/// GET /v1/exoplanets/{id}/constellations item
#[derive(Debug, Serialize)]
pub struct ConstellationResponse {
    pub id: Uuid,
    pub name: String,
    pub votes: u32,
    pub points: Vec<PointBody>,
}

impl From<Constellation> for ConstellationResponse {
    fn from(c: Constellation) -> Self {
        ConstellationResponse {
            id: c.id,
            name: c.name,
            votes: c.votes,
            points: c.points.into_iter().map(PointBody::from).collect(),
        }
    }
}
