//! Exoplanet views over stored jobs: summaries, the star stream and
//! user-drawn constellations.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
};
use futures::Stream;
use penrose_store::{Constellation, ConstellationPoint, Job, JobFilter, JobId};
use tracing::{debug, info, warn};

use super::AppState;
use super::types::{
    ConstellationResponse, CreateConstellationRequest, ExoplanetSummary, StarPage,
};
use crate::error::ApiError;

/// Result records sent per server-sent event.
pub const STAR_PAGE_SIZE: usize = 1000;

fn parse_job_id(id: &str) -> Result<JobId, ApiError> {
    JobId::parse(id.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid exoplanet id: {id}")))
}

async fn existing_job(state: &AppState, job_id: &JobId) -> Result<Job, ApiError> {
    state
        .store
        .get_job_by_id(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Exoplanet not found: {job_id}")))
}

/// GET /v1/exoplanets - Every submitted exoplanet, oldest first.
pub async fn list_exoplanets(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExoplanetSummary>>, ApiError> {
    let jobs = state.store.list_jobs(&JobFilter::new()).await?;
    Ok(Json(jobs.into_iter().map(ExoplanetSummary::from).collect()))
}

/// GET /v1/exoplanets/{id}/stars - Stream the job's result rows.
///
/// Each `data:` event carries a JSON array of up to [`STAR_PAGE_SIZE`] star
/// field maps, in row order. A store failure mid-stream ends the stream with
/// an `error` event.
pub async fn stream_stars(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    existing_job(&state, &job_id).await?;

    let store = Arc::clone(&state.store);
    let pages = futures::stream::unfold(Some(0usize), move |offset| {
        let store = Arc::clone(&store);
        async move {
            let offset = offset?;
            match store.list_results(&job_id, offset, STAR_PAGE_SIZE).await {
                Ok(records) if records.is_empty() => None,
                Ok(records) => {
                    let next = (records.len() == STAR_PAGE_SIZE).then_some(offset + records.len());
                    debug!(job_id = %job_id, offset, rows = records.len(), "Streaming star page");
                    let page: StarPage = records.into_iter().map(|r| r.star_data).collect();
                    Some((Event::default().json_data(page), next))
                }
                Err(e) => {
                    warn!(job_id = %job_id, offset, error = %e, "Star stream aborted");
                    Some((Ok(Event::default().event("error").data(e.to_string())), None))
                }
            }
        }
    });

    Ok(Sse::new(pages))
}

/// GET /v1/exoplanets/{id}/constellations
pub async fn list_constellations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConstellationResponse>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    existing_job(&state, &job_id).await?;

    let constellations = state.store.list_constellations(&job_id).await?;
    Ok(Json(
        constellations
            .into_iter()
            .map(ConstellationResponse::from)
            .collect(),
    ))
}

/// POST /v1/exoplanets/{id}/constellations - Save a new constellation with
/// no votes.
pub async fn create_constellation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateConstellationRequest>,
) -> Result<(StatusCode, Json<ConstellationResponse>), ApiError> {
    let job_id = parse_job_id(&id)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "constellation name must not be empty".to_string(),
        ));
    }
    if req
        .points
        .iter()
        .any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(ApiError::BadRequest(
            "constellation points must have finite coordinates".to_string(),
        ));
    }

    let points: Vec<ConstellationPoint> = req.points.into_iter().map(Into::into).collect();
    let constellation = Constellation::new(job_id, name, points);
    state.store.create_constellation(&constellation).await?;

    info!(
        job_id = %job_id,
        constellation_id = %constellation.id,
        points = constellation.points.len(),
        "Constellation created"
    );
    Ok((StatusCode::CREATED, Json(constellation.into())))
}
