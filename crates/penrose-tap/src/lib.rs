//! Penrose client for the Gaia TAP asynchronous query service.
//!
//! A neighbourhood query is submitted per Gaia source: the archive creates a
//! UWS job, the job is started, its phase is polled, and once it completes
//! the result table is downloaded as JSON.
//!
//! # Example
//!
//! ```ignore
//! use penrose_tap::{QueryService, QueryStatus, TapClient};
//!
//! let client = TapClient::new()?;
//! let job = client.submit("5853498713190525696").await?;
//!
//! if client.check_status(&job).await? == QueryStatus::Completed {
//!     let rows = client.fetch_results(&job).await?;
//!     println!("{} stars", rows.len());
//! }
//! ```

mod api;
mod error;
mod query;
mod results;
mod service;
mod status;
pub mod uws;

pub use api::{ASYNC_PATH, BASE_URL, TapClient, TapClientConfig};
pub use error::{TapError, TapResult};
pub use query::{AdqlTemplate, DEFAULT_TEMPLATE, SOURCE_ID_PLACEHOLDER, validate_source_id};
pub use results::{SourceRow, parse_results};
pub use service::QueryService;
pub use status::{JobUrl, QueryStatus};
