//! Error types for the REST API and the server host.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use penrose_store::StoreError;
use penrose_tap::TapError;
use penrose_tracker::TrackerError;
use serde::Serialize;

use crate::config::ConfigError;

/// Errors that stop the server process.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Result store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("TAP client setup failed: {0}")]
    Tap(#[from] TapError),

    #[error("Job tracker failed: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Job tracker task panicked: {0}")]
    TrackerPanicked(String),

    #[error("Job tracker did not stop within {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The Gaia archive failed or answered with something unusable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Conflict(_) => "conflict",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::InvalidJobId(msg) => ApiError::BadRequest(msg),
            StoreError::JobNotFound(id) => ApiError::NotFound(format!("Job not found: {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TapError> for ApiError {
    fn from(e: TapError) -> Self {
        match e {
            TapError::InvalidSourceId(id) => {
                ApiError::BadRequest(format!("Source id must be a decimal integer: {id:?}"))
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
