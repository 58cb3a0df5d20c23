//! Test builders for activated jobs.

use crate::worker::{ActivatedJob, Job, JobApi};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_KEY: AtomicU64 = AtomicU64::new(2_251_799_813_685_249_000);

/// Builder for activated jobs, as raw values or ready-to-handle [`Job`]s.
///
/// Keys default to unique 64-bit values above 2^53, so handlers that mangle
/// them are caught.
///
/// # Example
///
/// ```ignore
/// use camunda_sdk::testing::{JobBuilder, MockJobApi};
/// use serde_json::json;
///
/// let api = Arc::new(MockJobApi::new());
/// let job = JobBuilder::new("payment")
///     .variables(json!({"orderId": "A-1"}))
///     .retries(1)
///     .build_job(api.clone());
/// ```
#[derive(Debug, Clone)]
pub struct JobBuilder {
    key: Option<String>,
    job_type: String,
    process_instance_key: String,
    process_definition_id: String,
    element_id: String,
    retries: i32,
    deadline: i64,
    variables: Value,
    custom_headers: Value,
    tenant_id: Option<String>,
}

impl JobBuilder {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            key: None,
            job_type: job_type.into(),
            process_instance_key: "2251799813685248001".to_string(),
            process_definition_id: "test-process".to_string(),
            element_id: "service-task".to_string(),
            retries: 3,
            deadline: 0,
            variables: Value::Object(Map::new()),
            custom_headers: Value::Object(Map::new()),
            tenant_id: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn process_instance_key(mut self, key: impl Into<String>) -> Self {
        self.process_instance_key = key.into();
        self
    }

    pub fn element_id(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = element_id.into();
        self
    }

    pub fn retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    /// Lock expiry in epoch milliseconds.
    pub fn deadline(mut self, deadline: i64) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn custom_headers(mut self, headers: Value) -> Self {
        self.custom_headers = headers;
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    fn resolved_key(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| NEXT_KEY.fetch_add(1, Ordering::Relaxed).to_string())
    }

    /// The normalized job value, as the worker receives it from activation.
    pub fn build_raw(&self) -> Value {
        json!({
            "jobKey": self.resolved_key(),
            "type": self.job_type,
            "processInstanceKey": self.process_instance_key,
            "processDefinitionId": self.process_definition_id,
            "processDefinitionVersion": 1,
            "elementId": self.element_id,
            "customHeaders": self.custom_headers,
            "worker": "test-worker",
            "retries": self.retries,
            "deadline": self.deadline,
            "variables": self.variables,
            "tenantId": self.tenant_id,
        })
    }

    /// A job with untyped variables and headers.
    pub fn build_job(&self, api: Arc<dyn JobApi>) -> Job<Value, Value> {
        let activated = ActivatedJob {
            key: self.resolved_key(),
            job_type: self.job_type.clone(),
            process_instance_key: self.process_instance_key.clone(),
            process_definition_key: String::new(),
            process_definition_id: self.process_definition_id.clone(),
            process_definition_version: 1,
            element_id: self.element_id.clone(),
            element_instance_key: String::new(),
            custom_headers: self.custom_headers.clone(),
            worker: "test-worker".to_string(),
            retries: self.retries,
            deadline: self.deadline,
            variables: self.variables.clone(),
            tenant_id: self.tenant_id.clone(),
        };
        Self::wrap(activated, api)
    }

    /// A job whose variables and headers decode into `V` and `H`.
    pub fn build_typed<V, H>(&self, api: Arc<dyn JobApi>) -> serde_json::Result<Job<V, H>>
    where
        V: DeserializeOwned,
        H: DeserializeOwned,
    {
        let activated: ActivatedJob<V, H> = serde_json::from_value(self.build_raw())?;
        Ok(Self::wrap(activated, api))
    }

    fn wrap<V, H>(activated: ActivatedJob<V, H>, api: Arc<dyn JobApi>) -> Job<V, H> {
        let span = tracing::info_span!(
            "job",
            job_key = %activated.key,
            job_type = %activated.job_type
        );
        Job::new(activated, api, span)
    }
}
