//! The query-service seam used by the job tracker and the HTTP API.

use async_trait::async_trait;

use crate::api::TapClient;
use crate::error::TapResult;
use crate::results::SourceRow;
use crate::status::{JobUrl, QueryStatus};

/// Remote asynchronous query service.
///
/// The production implementation is [`TapClient`]; tests substitute
/// scripted fakes.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submit and start the neighbourhood query for `source_id`.
    async fn submit(&self, source_id: &str) -> TapResult<JobUrl>;

    /// Current status of a previously submitted job.
    async fn check_status(&self, job_url: &JobUrl) -> TapResult<QueryStatus>;

    /// Result rows of a completed job.
    async fn fetch_results(&self, job_url: &JobUrl) -> TapResult<Vec<SourceRow>>;
}

#[async_trait]
impl QueryService for TapClient {
    async fn submit(&self, source_id: &str) -> TapResult<JobUrl> {
        self.submit_query(source_id).await
    }

    async fn check_status(&self, job_url: &JobUrl) -> TapResult<QueryStatus> {
        self.job_status(job_url).await
    }

    async fn fetch_results(&self, job_url: &JobUrl) -> TapResult<Vec<SourceRow>> {
        self.job_results(job_url).await
    }
}
