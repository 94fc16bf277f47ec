//! Gaia TAP REST client.
//!
//! Implements the asynchronous (UWS) flavour of the IVOA Table Access
//! Protocol as served by the ESA Gaia archive
//! (`https://gea.esac.esa.int/tap-server/tap/async`).

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{TapError, TapResult};
use crate::query::AdqlTemplate;
use crate::results::{SourceRow, parse_results};
use crate::status::{JobUrl, QueryStatus};
use crate::uws;

/// Gaia archive base URL.
pub const BASE_URL: &str = "https://gea.esac.esa.int";

/// Path of the asynchronous job list, relative to the base URL.
pub const ASYNC_PATH: &str = "tap-server/tap/async";

/// Connection settings for [`TapClient`].
#[derive(Debug, Clone)]
pub struct TapClientConfig {
    /// Service base URL, e.g. `https://gea.esac.esa.int`.
    pub base_url: String,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Query submitted for each source.
    pub template: AdqlTemplate,
}

impl Default for TapClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            template: AdqlTemplate::default(),
        }
    }
}

/// TAP REST client.
#[derive(Debug, Clone)]
pub struct TapClient {
    /// HTTP client with timeouts configured.
    client: Client,
    /// Service base URL (without trailing slash).
    base_url: String,
    template: AdqlTemplate,
}

impl TapClient {
    /// Create a client against the public Gaia archive with default settings.
    pub fn new() -> TapResult<Self> {
        Self::with_config(TapClientConfig::default())
    }

    /// Create a client targeting a custom base URL (useful for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> TapResult<Self> {
        Self::with_config(TapClientConfig {
            base_url: base_url.into(),
            ..TapClientConfig::default()
        })
    }

    /// Create a client from explicit settings.
    pub fn with_config(config: TapClientConfig) -> TapResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TapError::Configuration(format!(
                "TAP base URL must be http(s): {base_url:?}"
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(TapError::Http)?;

        Ok(Self {
            client,
            base_url,
            template: config.template,
        })
    }

    /// Service base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the asynchronous job list.
    fn async_url(&self) -> String {
        format!("{}/{}", self.base_url, ASYNC_PATH)
    }

    /// Return the body of a successful response or an API error.
    async fn handle_response(&self, response: reqwest::Response) -> TapResult<String> {
        let status = response.status();

        if status.is_success() {
            Ok(response.text().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(TapError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Public API methods
    // -----------------------------------------------------------------------

    /// Create a job for `source_id` and start it.
    ///
    /// Returns the URL of the created job. A failure to start the job after
    /// creation is reported as an error; the orphaned remote job is left to
    /// the archive's own destruction policy.
    #[instrument(skip(self))]
    pub async fn submit_query(&self, source_id: &str) -> TapResult<JobUrl> {
        let query = self.template.render(source_id)?;
        let url = self.async_url();
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .form(&[
                ("REQUEST", "doQuery"),
                ("LANG", "ADQL"),
                ("FORMAT", "json"),
                ("QUERY", query.as_str()),
            ])
            .send()
            .await?;
        let body = self.handle_response(resp).await?;

        let job_id = uws::parse_job_id(&body)?;
        let job_url = JobUrl::new(format!("{url}/{job_id}"));
        debug!("Created TAP job {} for source {}", job_id, source_id);

        self.start_job(&job_url).await?;
        Ok(job_url)
    }

    /// Move a pending job to the execution queue.
    #[instrument(skip(self))]
    pub async fn start_job(&self, job_url: &JobUrl) -> TapResult<()> {
        let url = job_url.phase_url();
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .form(&[("PHASE", "RUN")])
            .send()
            .await?;
        self.handle_response(resp).await?;
        Ok(())
    }

    /// Fetch the job document and classify its phase.
    #[instrument(skip(self))]
    pub async fn job_status(&self, job_url: &JobUrl) -> TapResult<QueryStatus> {
        debug!("GET {}", job_url);

        let resp = self.client.get(job_url.as_str()).send().await?;
        let body = self.handle_response(resp).await?;
        uws::parse_phase(&body)
    }

    /// Download and decode the result table of a completed job.
    #[instrument(skip(self))]
    pub async fn job_results(&self, job_url: &JobUrl) -> TapResult<Vec<SourceRow>> {
        let url = job_url.result_url();
        debug!("GET {}", url);

        let resp = self.client.get(&url).send().await?;
        let body = self.handle_response(resp).await?;
        let rows = parse_results(&body)?;
        debug!("Fetched {} result rows from {}", rows.len(), job_url);
        Ok(rows)
    }
}
