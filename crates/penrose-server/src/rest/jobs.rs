//! Job submission and status endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use parking_lot::Mutex;
use penrose_store::{Job, JobFilter, JobStatus};
use penrose_tap::{JobUrl, validate_source_id};
use rustc_hash::FxHashSet;
use tracing::{error, info, warn};

use super::AppState;
use super::types::{CreateJobRequest, JobListParams, JobResponse, JobStatusResponse};
use crate::error::ApiError;

/// Source ids with a creation request between its duplicate check and its
/// registration.
#[derive(Debug, Default)]
pub(crate) struct SubmissionLocks {
    in_flight: Mutex<FxHashSet<String>>,
}

impl SubmissionLocks {
    /// Claim `source_id` until the returned guard drops. `None` if another
    /// request holds it.
    fn claim(self: &Arc<Self>, source_id: &str) -> Option<SubmissionClaim> {
        if !self.in_flight.lock().insert(source_id.to_string()) {
            return None;
        }
        Some(SubmissionClaim {
            locks: Arc::clone(self),
            source_id: source_id.to_string(),
        })
    }
}

struct SubmissionClaim {
    locks: Arc<SubmissionLocks>,
    source_id: String,
}

impl Drop for SubmissionClaim {
    fn drop(&mut self) {
        self.locks.in_flight.lock().remove(&self.source_id);
    }
}

/// POST /v1/jobs - Submit a neighbourhood query for a host star.
///
/// Rejected with 409 while a job for the same source is pending, executing
/// or completed; a source whose last job failed may be resubmitted.
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let source_id = req.source_id.trim().to_string();
    validate_source_id(&source_id)?;

    let name = req.exoplanet_name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "exoplanet_name must not be empty".to_string(),
        ));
    }
    if !req.parallax_from_earth.is_finite() {
        return Err(ApiError::BadRequest(
            "parallax_from_earth must be a finite number".to_string(),
        ));
    }

    let _claim = state.submissions.claim(&source_id).ok_or_else(|| {
        ApiError::Conflict(format!("A job for source {source_id} is already being created"))
    })?;

    if state.registry.contains(&source_id) {
        return Err(ApiError::Conflict(format!(
            "A job for source {source_id} is already running"
        )));
    }
    let existing = state.store.get_job(&source_id).await?;
    if let Some(existing) = existing.filter(|job| job.status != JobStatus::Error) {
        return Err(ApiError::Conflict(format!(
            "A job for source {source_id} already exists ({})",
            existing.status
        )));
    }

    let job_url = state.query.submit(&source_id).await.map_err(|e| {
        warn!(source_id = %source_id, error = %e, "Query submission failed");
        ApiError::from(e)
    })?;

    let job = Job::new(
        source_id.clone(),
        job_url.as_str(),
        name,
        req.parallax_from_earth,
    );
    if let Err(e) = state.store.create_job(&job).await {
        error!(
            source_id = %source_id,
            job_url = %job_url,
            error = %e,
            "Remote job started but could not be stored"
        );
        return Err(e.into());
    }

    state.registry.add(source_id.clone(), job_url);
    state.metrics.record_job_submitted();
    state.metrics.set_registry_size(state.registry.len());

    info!(source_id = %source_id, job_id = %job.id, "Job submitted");
    Ok((StatusCode::CREATED, Json(job.into())))
}

/// GET /v1/jobs - List stored jobs, oldest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    let mut filter = JobFilter::new();

    if let Some(ref statuses) = params.status {
        let parsed = statuses
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                JobStatus::parse(s)
                    .ok_or_else(|| ApiError::BadRequest(format!("Unknown job status: {s}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        filter = filter.with_statuses(parsed);
    }
    if let Some(limit) = params.limit {
        filter = filter.with_limit(limit);
    }

    let jobs = state.store.list_jobs(&filter).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

/// GET /v1/jobs/{source_id}/status - Live status from the Gaia archive.
///
/// Never submits a query; unknown sources are 404.
pub async fn job_status(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let source_id = source_id.trim();
    let job = state
        .store
        .get_job(source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No job for source {source_id}")))?;

    let live = state
        .query
        .check_status(&JobUrl::new(job.job_url.clone()))
        .await?;

    Ok(Json(JobStatusResponse {
        source_id: job.source_id,
        status: live.to_string().to_lowercase(),
        stored_status: job.status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let locks = Arc::new(SubmissionLocks::default());

        let first = locks.claim("42");
        assert!(first.is_some());
        assert!(locks.claim("42").is_none());
        assert!(locks.claim("43").is_some());

        drop(first);
        assert!(locks.claim("42").is_some());
    }
}
