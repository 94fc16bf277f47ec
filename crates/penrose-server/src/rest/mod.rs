//! REST API for submitting Gaia neighbourhood queries and reading their
//! results.
//!
//! Job and exoplanet routes sit behind optional bearer authentication;
//! health and metrics routes are always open.

pub mod auth;
mod exoplanets;
mod jobs;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::get,
};
use penrose_store::ResultStore;
use penrose_tap::QueryService;
use penrose_tracker::{JobRegistry, Metrics};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::health;
use auth::AuthState;
use jobs::SubmissionLocks;

// ── Shared application state ──────────────────────────────────────────────

/// Application state shared across all REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResultStore>,
    pub query: Arc<dyn QueryService>,
    /// Shared with the background tracker.
    pub registry: Arc<JobRegistry>,
    pub metrics: Metrics,
    pub auth: AuthState,
    submissions: Arc<SubmissionLocks>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ResultStore>,
        query: Arc<dyn QueryService>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            store,
            query,
            registry,
            metrics: Metrics::new(),
            auth: AuthState::default(),
            submissions: Arc::new(SubmissionLocks::default()),
        }
    }

    /// Require `Authorization: Bearer <api_key>` on job and exoplanet routes.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.auth = AuthState::new(api_key);
        self
    }
}

// ── Router construction ───────────────────────────────────────────────────

/// Build the Axum router for the whole HTTP surface.
///
/// `cors_origins` is a comma-separated list of allowed origins, or `"*"`.
pub fn rest_router(state: AppState, cors_origins: &str) -> Router {
    let cors = build_cors_layer(cors_origins);

    let api = Router::new()
        .route("/v1/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/v1/jobs/{source_id}/status", get(jobs::job_status))
        .route("/v1/exoplanets", get(exoplanets::list_exoplanets))
        .route("/v1/exoplanets/{id}/stars", get(exoplanets::stream_stars))
        .route(
            "/v1/exoplanets/{id}/constellations",
            get(exoplanets::list_constellations).post(exoplanets::create_constellation),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::bearer_auth,
        ));

    Router::new()
        .merge(api)
        .merge(health::health_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn build_cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.trim() == "*" {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|o| o.trim().parse().ok())
            .collect();
        layer.allow_origin(allowed)
    }
}
