//! HTTP host for the Penrose job tracker.
//!
//! Wires the Gaia TAP client, the result store and the background tracker
//! behind an axum REST API:
//!
//! - [`config`]: YAML / `.env` / `PENROSE_*` configuration
//! - [`rest`]: job submission, status and exoplanet routes
//! - [`health`]: liveness, readiness and Prometheus metrics
//! - [`app`]: startup and coordinated shutdown of the listener and tracker

pub mod app;
pub mod config;
pub mod error;
pub mod health;
pub mod rest;
pub mod tracing_config;

pub use app::{open_store, run, serve};
pub use config::{Config, ConfigError};
pub use error::{ApiError, ServerError};
pub use rest::{AppState, rest_router};
pub use tracing_config::{TracingConfig, TracingFormat, init_tracing};
