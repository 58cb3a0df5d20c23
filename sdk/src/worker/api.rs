//! The slice of the engine API a job worker depends on.

use crate::client::types::{ActivateJobsRequest, JobError, JobFailure};
use crate::error::Result;
use async_trait::async_trait;
use camunda_core::SchemaRef;
use serde_json::Value;

/// Job operations used by [`JobWorker`](super::JobWorker) and [`Job`](super::Job).
///
/// Implemented by the REST client; tests substitute an in-memory fake.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Activate jobs and decode each one through `schema`.
    ///
    /// Returned values are normalized: int64 fields are decimal strings.
    async fn activate_jobs(
        &self,
        request: &ActivateJobsRequest,
        schema: &SchemaRef,
    ) -> Result<Vec<Value>>;

    /// Complete a job with already-encoded output variables.
    async fn complete_job(&self, job_key: &str, variables: Value) -> Result<()>;

    /// Fail a job.
    async fn fail_job(&self, job_key: &str, failure: &JobFailure) -> Result<()>;

    /// Throw a BPMN error from a job.
    async fn throw_job_error(&self, job_key: &str, error: &JobError) -> Result<()>;
}
