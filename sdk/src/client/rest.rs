//! REST client for the Camunda 8 v2 API.

use super::transport::{RequestHook, RestTransport};
use super::types::{
    ActivateJobsRequest, BroadcastSignal, CreateProcessInstance, JobError, JobFailure,
    MessagePublished, ProcessInstanceCreated, ProcessInstanceResult, PublishMessage,
    SignalBroadcast, Topology,
};
use crate::config::{ClientConfig, JobWorkerConfig};
use crate::error::{Result, SdkError};
use crate::worker::{ActivatedJob, HookChain, JobApi, JobHandler, JobWorker, LoggingHook};
use async_trait::async_trait;
use camunda_core::codec::{
    job_schema, parse, parse_as, parse_with, process_instance_result_schema, serialize,
    serialize_with, LosslessDto,
};
use camunda_core::{AuthProvider, SchemaRef};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Client for the orchestration cluster REST API.
///
/// Cheap to clone; clones share one connection pool and auth provider.
#[derive(Clone, Debug)]
pub struct CamundaRestClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    transport: RestTransport,
    tenant_id: Option<String>,
}

impl CamundaRestClient {
    /// Create a client builder
    pub fn builder() -> super::CamundaClientBuilder {
        super::CamundaClientBuilder::new()
    }

    pub fn new(
        config: &ClientConfig,
        auth: Arc<dyn AuthProvider>,
        hooks: Vec<Arc<dyn RequestHook>>,
    ) -> Result<Self> {
        let transport = RestTransport::new(config, auth, hooks)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                tenant_id: config.tenant_id.clone(),
            }),
        })
    }

    /// Default tenant applied to requests that name none
    pub fn tenant_id(&self) -> Option<&str> {
        self.inner.tenant_id.as_deref()
    }

    /// Brokers, partitions and gateway version of the cluster.
    pub async fn topology(&self) -> Result<Topology> {
        let text = self.inner.transport.send(Method::GET, "/topology", None).await?;
        Ok(parse_as(&text)?)
    }

    /// Activate jobs, returning them with typed variables and headers.
    pub async fn activate_jobs_typed<V, H>(
        &self,
        request: &ActivateJobsRequest,
    ) -> Result<Vec<ActivatedJob<V, H>>>
    where
        V: LosslessDto + DeserializeOwned,
        H: LosslessDto + DeserializeOwned,
    {
        let schema = job_schema(&V::schema(), &H::schema());
        self.activate_jobs(request, &schema)
            .await?
            .into_iter()
            .map(|job| serde_json::from_value(job).map_err(SdkError::from))
            .collect()
    }

    /// Set the remaining retries of a job.
    pub async fn update_job_retries(&self, job_key: &str, retries: i32) -> Result<()> {
        let body = serialize_with(&json!({ "changeset": { "retries": retries } }), None)?;
        self.inner
            .transport
            .send(Method::PATCH, &format!("/jobs/{job_key}"), Some(body))
            .await?;
        Ok(())
    }

    /// Start a process instance without waiting for it to finish.
    pub async fn create_process_instance(
        &self,
        request: CreateProcessInstance,
    ) -> Result<ProcessInstanceCreated> {
        let request = self.with_default_tenant(request);
        let body = serialize(&request)?;
        let text = self
            .inner
            .transport
            .send(Method::POST, "/process-instances", Some(body))
            .await?;
        Ok(parse_as(&text)?)
    }

    /// Start a process instance and wait for its result.
    ///
    /// Output variables are decoded through `V`'s schema.
    pub async fn create_process_instance_with_result<V>(
        &self,
        request: CreateProcessInstance,
    ) -> Result<ProcessInstanceResult<V>>
    where
        V: LosslessDto + DeserializeOwned,
    {
        let mut request = self.with_default_tenant(request);
        request.await_completion = Some(true);
        let body = serialize(&request)?;
        let text = self
            .inner
            .transport
            .send(Method::POST, "/process-instances", Some(body))
            .await?;
        let schema = process_instance_result_schema(&V::schema());
        Ok(parse_with(&text, Some(&schema), None)?)
    }

    pub async fn cancel_process_instance(&self, process_instance_key: &str) -> Result<()> {
        self.inner
            .transport
            .send(
                Method::POST,
                &format!("/process-instances/{process_instance_key}/cancellation"),
                None,
            )
            .await?;
        Ok(())
    }

    /// Publish a message for correlation.
    pub async fn publish_message(&self, message: PublishMessage) -> Result<MessagePublished> {
        let mut message = message;
        if message.tenant_id.is_none() {
            message.tenant_id = self.inner.tenant_id.clone();
        }
        let body = serialize(&message)?;
        let text = self
            .inner
            .transport
            .send(Method::POST, "/messages/publication", Some(body))
            .await?;
        Ok(parse_as(&text)?)
    }

    pub async fn broadcast_signal(&self, signal: BroadcastSignal) -> Result<SignalBroadcast> {
        let mut signal = signal;
        if signal.tenant_id.is_none() {
            signal.tenant_id = self.inner.tenant_id.clone();
        }
        let body = serialize(&signal)?;
        let text = self
            .inner
            .transport
            .send(Method::POST, "/signals/broadcast", Some(body))
            .await?;
        Ok(parse_as(&text)?)
    }

    /// Create a job worker backed by this client, logging its events.
    pub fn job_worker<V, H, F>(&self, config: JobWorkerConfig, handler: F) -> Result<JobWorker<V, H>>
    where
        V: LosslessDto + DeserializeOwned + Send + 'static,
        H: LosslessDto + DeserializeOwned + Send + 'static,
        F: JobHandler<V, H> + 'static,
    {
        let mut hooks = HookChain::new();
        hooks.add(LoggingHook::default());
        self.job_worker_with_hooks(config, handler, hooks)
    }

    /// Create a job worker with a custom hook chain.
    pub fn job_worker_with_hooks<V, H, F>(
        &self,
        config: JobWorkerConfig,
        handler: F,
        hooks: HookChain,
    ) -> Result<JobWorker<V, H>>
    where
        V: LosslessDto + DeserializeOwned + Send + 'static,
        H: LosslessDto + DeserializeOwned + Send + 'static,
        F: JobHandler<V, H> + 'static,
    {
        let mut config = config;
        if config.tenant_ids.is_none() {
            config.tenant_ids = self.inner.tenant_id.clone().map(|tenant| vec![tenant]);
        }
        JobWorker::new(config, Arc::new(self.clone()), handler, hooks)
    }

    fn with_default_tenant(&self, mut request: CreateProcessInstance) -> CreateProcessInstance {
        if request.tenant_id.is_none() {
            request.tenant_id = self.inner.tenant_id.clone();
        }
        request
    }
}

#[async_trait]
impl JobApi for CamundaRestClient {
    async fn activate_jobs(
        &self,
        request: &ActivateJobsRequest,
        schema: &SchemaRef,
    ) -> Result<Vec<Value>> {
        let body = serialize(request)?;
        let text = self
            .inner
            .transport
            .send(Method::POST, "/jobs/activation", Some(body))
            .await?;
        let jobs = match parse(&text, Some(schema), Some("jobs"))? {
            Value::Array(jobs) => jobs,
            _ => Vec::new(),
        };
        debug!(job_type = %request.job_type, count = jobs.len(), "Activated jobs");
        Ok(jobs)
    }

    async fn complete_job(&self, job_key: &str, variables: Value) -> Result<()> {
        let body = serialize_with(&json!({ "variables": variables }), None)?;
        self.inner
            .transport
            .send(Method::POST, &format!("/jobs/{job_key}/completion"), Some(body))
            .await?;
        Ok(())
    }

    async fn fail_job(&self, job_key: &str, failure: &JobFailure) -> Result<()> {
        let body = serialize(failure)?;
        self.inner
            .transport
            .send(Method::POST, &format!("/jobs/{job_key}/failure"), Some(body))
            .await?;
        Ok(())
    }

    async fn throw_job_error(&self, job_key: &str, error: &JobError) -> Result<()> {
        let body = serialize(error)?;
        self.inner
            .transport
            .send(Method::POST, &format!("/jobs/{job_key}/error"), Some(body))
            .await?;
        Ok(())
    }
}
