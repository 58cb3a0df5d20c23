//! Activated jobs and the actions a handler takes on them.

use super::api::JobApi;
use crate::client::types::{JobError, JobFailure};
use crate::error::Result;
use camunda_core::codec::{to_wire_value, LosslessDto};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::Span;

/// A job as returned by activation, with typed variables and headers.
///
/// Keys are decimal strings so that 64-bit values survive exactly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "V: DeserializeOwned, H: DeserializeOwned"))]
pub struct ActivatedJob<V, H> {
    #[serde(alias = "jobKey")]
    pub key: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub process_instance_key: String,
    #[serde(default)]
    pub process_definition_key: String,
    #[serde(default, alias = "bpmnProcessId")]
    pub process_definition_id: String,
    #[serde(default)]
    pub process_definition_version: i32,
    pub element_id: String,
    #[serde(default)]
    pub element_instance_key: String,
    pub custom_headers: H,
    #[serde(default)]
    pub worker: String,
    pub retries: i32,
    /// Lock expiry, epoch milliseconds
    pub deadline: i64,
    pub variables: V,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// What a handler did with its job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Completed,
    Failed,
    Errored,
    /// Left for another party to settle
    Forwarded,
}

/// Proof that a job was settled.
///
/// Only the actions on [`Job`] produce one, so a handler that returns
/// `Ok(receipt)` has necessarily acknowledged its job.
#[must_use = "return the receipt from the job handler"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobActionReceipt {
    action: JobAction,
}

impl JobActionReceipt {
    pub(crate) fn new(action: JobAction) -> Self {
        Self { action }
    }

    pub fn action(&self) -> JobAction {
        self.action
    }
}

/// A job handed to a handler.
///
/// Dereferences to [`ActivatedJob`]. The settling actions consume the job,
/// so each job is acknowledged at most once.
pub struct Job<V, H> {
    inner: ActivatedJob<V, H>,
    api: Arc<dyn JobApi>,
    span: Span,
}

impl<V, H> Job<V, H> {
    pub(crate) fn new(inner: ActivatedJob<V, H>, api: Arc<dyn JobApi>, span: Span) -> Self {
        Self { inner, api, span }
    }

    /// Span carrying this job's key and type
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The decoded job data
    pub fn data(&self) -> &ActivatedJob<V, H> {
        &self.inner
    }

    pub fn into_inner(self) -> ActivatedJob<V, H> {
        self.inner
    }

    /// Complete the job with output variables.
    ///
    /// Numbers in `variables` are written as-is; use
    /// [`complete_typed`](Self::complete_typed) for 64-bit fields held as strings.
    pub async fn complete<T>(self, variables: &T) -> Result<JobActionReceipt>
    where
        T: Serialize + ?Sized,
    {
        let wire = to_wire_value(variables, None)?;
        self.settle_complete(wire).await
    }

    /// Complete the job, encoding variables through their declared schema.
    pub async fn complete_typed<T>(self, variables: &T) -> Result<JobActionReceipt>
    where
        T: LosslessDto + Serialize,
    {
        let wire = to_wire_value(variables, Some(&T::schema()))?;
        self.settle_complete(wire).await
    }

    async fn settle_complete(self, wire: serde_json::Value) -> Result<JobActionReceipt> {
        self.api.complete_job(&self.inner.key, wire).await?;
        tracing::debug!(parent: &self.span, "Job completed");
        Ok(JobActionReceipt::new(JobAction::Completed))
    }

    /// Fail the job. Retries default to the job's remaining retries minus one.
    pub async fn fail(self, mut failure: JobFailure) -> Result<JobActionReceipt> {
        if failure.retries.is_none() {
            failure.retries = Some(decrement_retries(self.inner.retries));
        }
        self.api.fail_job(&self.inner.key, &failure).await?;
        tracing::debug!(
            parent: &self.span,
            retries = failure.retries,
            error = %failure.error_message,
            "Job failed"
        );
        Ok(JobActionReceipt::new(JobAction::Failed))
    }

    /// Throw a BPMN error, to be caught by a boundary event.
    pub async fn error(self, error: JobError) -> Result<JobActionReceipt> {
        self.api.throw_job_error(&self.inner.key, &error).await?;
        tracing::debug!(parent: &self.span, error_code = %error.error_code, "Job error thrown");
        Ok(JobActionReceipt::new(JobAction::Errored))
    }

    /// Acknowledge the job without settling it with the engine.
    pub fn forward(self) -> JobActionReceipt {
        tracing::debug!(parent: &self.span, "Job forwarded");
        JobActionReceipt::new(JobAction::Forwarded)
    }
}

impl<V, H> Deref for Job<V, H> {
    type Target = ActivatedJob<V, H>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<V: fmt::Debug, H: fmt::Debug> fmt::Debug for Job<V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("inner", &self.inner).finish()
    }
}

/// Retries left after one more failure, never negative.
pub(crate) fn decrement_retries(retries: i32) -> i32 {
    retries.saturating_sub(1).max(0)
}
