//! Health check and metrics HTTP endpoints.
//!
//! - /v1/health - Basic liveness check
//! - /v1/health/ready - Readiness check against the result store
//! - /metrics - Prometheus metrics in text format

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::rest::AppState;
use crate::rest::types::{HealthResponse, ReadinessResponse};

/// Handler for GET /v1/health
///
/// Always 200 while the process is serving requests.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for GET /v1/health/ready
///
/// 503 when the result store does not answer its health probe.
async fn readiness_handler(State(state): State<AppState>) -> Response {
    let (ready, store) = match state.store.health_check().await {
        Ok(()) => (true, "ok".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Result store health check failed");
            (false, e.to_string())
        }
    };

    let response = ReadinessResponse {
        ready,
        store,
        tracked_jobs: state.registry.len(),
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response)).into_response()
}

/// Handler for GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    state.metrics.set_registry_size(state.registry.len());
    match state.metrics.export() {
        Ok(metrics) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics,
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to export metrics".to_string(),
        )
            .into_response(),
    }
}

/// Routes for liveness, readiness and metrics.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health_handler))
        .route("/v1/health/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
}
