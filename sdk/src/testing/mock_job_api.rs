//! In-memory job API for testing workers without a cluster.

use crate::client::types::{ActivateJobsRequest, JobError, JobFailure};
use crate::error::{Result, SdkError};
use crate::worker::JobApi;
use async_trait::async_trait;
use camunda_core::SchemaRef;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Mock implementation of [`JobApi`].
///
/// Queued jobs are handed out in order, at most `max_jobs_to_activate` per
/// activation. Every call is recorded for assertions.
///
/// # Example
///
/// ```ignore
/// let api = Arc::new(MockJobApi::new());
/// api.push_job(JobBuilder::new("payment").key("1").build_raw());
///
/// let worker = JobWorker::new(config, api.clone(), handler, HookChain::new())?;
/// // ...
/// assert_eq!(api.completed().len(), 1);
/// ```
pub struct MockJobApi {
    inner: Arc<MockJobApiInner>,
}

#[derive(Default)]
struct MockJobApiInner {
    pending: RwLock<VecDeque<Value>>,
    activation_error: RwLock<Option<String>>,
    activation_delay: RwLock<Option<Duration>>,
    ignore_activation_limit: RwLock<bool>,
    activation_requests: RwLock<Vec<ActivateJobsRequest>>,
    completed: RwLock<Vec<(String, Value)>>,
    failed: RwLock<Vec<(String, JobFailure)>>,
    errored: RwLock<Vec<(String, JobError)>>,
}

impl Clone for MockJobApi {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for MockJobApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobApi {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockJobApiInner::default()),
        }
    }

    /// Queue a job for activation.
    pub fn push_job(&self, job: Value) {
        self.inner.pending.write().push_back(job);
    }

    /// Queue several jobs for activation.
    pub fn push_jobs(&self, jobs: impl IntoIterator<Item = Value>) {
        self.inner.pending.write().extend(jobs);
    }

    /// Jobs not yet handed out
    pub fn pending_count(&self) -> usize {
        self.inner.pending.read().len()
    }

    /// Make every activation fail with `message` until cleared.
    pub fn fail_activations(&self, message: impl Into<String>) {
        *self.inner.activation_error.write() = Some(message.into());
    }

    pub fn clear_activation_error(&self) {
        *self.inner.activation_error.write() = None;
    }

    /// Delay each activation response, as a long poll would.
    pub fn delay_activations(&self, delay: Duration) {
        *self.inner.activation_delay.write() = Some(delay);
    }

    /// Hand out every queued job on each activation, regardless of
    /// `max_jobs_to_activate`.
    pub fn ignore_activation_limit(&self) {
        *self.inner.ignore_activation_limit.write() = true;
    }

    /// All activation requests received.
    pub fn activation_requests(&self) -> Vec<ActivateJobsRequest> {
        self.inner.activation_requests.read().clone()
    }

    /// Completed jobs as `(job_key, variables)`.
    pub fn completed(&self) -> Vec<(String, Value)> {
        self.inner.completed.read().clone()
    }

    /// Failed jobs as `(job_key, failure)`.
    pub fn failed(&self) -> Vec<(String, JobFailure)> {
        self.inner.failed.read().clone()
    }

    /// BPMN errors thrown as `(job_key, error)`.
    pub fn errored(&self) -> Vec<(String, JobError)> {
        self.inner.errored.read().clone()
    }
}

#[async_trait]
impl JobApi for MockJobApi {
    async fn activate_jobs(
        &self,
        request: &ActivateJobsRequest,
        _schema: &SchemaRef,
    ) -> Result<Vec<Value>> {
        self.inner.activation_requests.write().push(request.clone());

        let delay = *self.inner.activation_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let error = self.inner.activation_error.read().clone();
        if let Some(message) = error {
            return Err(SdkError::Status {
                status: 503,
                body: message,
            });
        }

        let mut pending = self.inner.pending.write();
        let count = if *self.inner.ignore_activation_limit.read() {
            pending.len()
        } else {
            request.max_jobs_to_activate.min(pending.len())
        };
        Ok(pending.drain(..count).collect())
    }

    async fn complete_job(&self, job_key: &str, variables: Value) -> Result<()> {
        self.inner
            .completed
            .write()
            .push((job_key.to_string(), variables));
        Ok(())
    }

    async fn fail_job(&self, job_key: &str, failure: &JobFailure) -> Result<()> {
        self.inner
            .failed
            .write()
            .push((job_key.to_string(), failure.clone()));
        Ok(())
    }

    async fn throw_job_error(&self, job_key: &str, error: &JobError) -> Result<()> {
        self.inner
            .errored
            .write()
            .push((job_key.to_string(), error.clone()));
        Ok(())
    }
}
