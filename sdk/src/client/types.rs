//! Request and response types of the v2 REST API.
//!
//! 64-bit keys are held as decimal strings; each type's schema tells the
//! codec to read and write them as bare JSON integers.

use camunda_core::codec::{LosslessDto, Schema, SchemaRef};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

macro_rules! lossless_schema {
    ($ty:ty, $build:expr) => {
        impl LosslessDto for $ty {
            fn schema() -> SchemaRef {
                static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
                SCHEMA.get_or_init(|| $build).clone()
            }
        }
    };
}

/// Cluster topology
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default)]
    pub brokers: Vec<BrokerInfo>,
    pub cluster_size: u32,
    pub partitions_count: u32,
    pub replication_factor: u32,
    pub gateway_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerInfo {
    pub node_id: u32,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub partitions: Vec<Partition>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub partition_id: u32,
    pub role: String,
    pub health: String,
}

lossless_schema!(Topology, Schema::builder("Topology").build());

/// Body of an activation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateJobsRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub worker: String,
    /// Job lock timeout in milliseconds
    pub timeout: u64,
    pub max_jobs_to_activate: usize,
    #[serde(rename = "fetchVariable", skip_serializing_if = "Option::is_none")]
    pub fetch_variables: Option<Vec<String>>,
    /// Long-poll timeout in milliseconds
    pub request_timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_ids: Option<Vec<String>>,
}

lossless_schema!(
    ActivateJobsRequest,
    Schema::builder("ActivateJobsRequest")
        .plain("timeout")
        .plain("maxJobsToActivate")
        .plain("requestTimeout")
        .build()
);

/// Explicit failure of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub error_message: String,
    /// Remaining retries; defaults to the job's retries minus one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
    /// Delay before the job may be retried, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_back_off: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl JobFailure {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            retries: None,
            retry_back_off: None,
            variables: None,
        }
    }

    pub fn with_retries(mut self, retries: i32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_retry_back_off(mut self, back_off: Duration) -> Self {
        self.retry_back_off = Some(back_off.as_millis() as u64);
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

lossless_schema!(
    JobFailure,
    Schema::builder("JobFailure")
        .plain("retries")
        .plain("retryBackOff")
        .build()
);

/// BPMN error thrown from a job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl JobError {
    pub fn new(error_code: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: None,
            variables: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

lossless_schema!(JobError, Schema::builder("JobError").build());

/// Start a process instance by id (latest version) or by definition key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProcessInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_definition_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_definition_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_definition_version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_completion: Option<bool>,
    /// Milliseconds to wait for completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_variables: Option<Vec<String>>,
}

impl CreateProcessInstance {
    /// Latest version of the process with this BPMN id
    pub fn by_id(process_definition_id: impl Into<String>) -> Self {
        Self {
            process_definition_id: Some(process_definition_id.into()),
            ..Self::empty()
        }
    }

    /// A specific deployed definition
    pub fn by_key(process_definition_key: impl Into<String>) -> Self {
        Self {
            process_definition_key: Some(process_definition_key.into()),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            process_definition_id: None,
            process_definition_key: None,
            process_definition_version: None,
            variables: None,
            tenant_id: None,
            await_completion: None,
            request_timeout: None,
            fetch_variables: None,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.process_definition_version = Some(version);
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_fetch_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_variables = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

lossless_schema!(
    CreateProcessInstance,
    Schema::builder("CreateProcessInstance")
        .int64("processDefinitionKey")
        .build()
);

/// Process instance created without awaiting completion
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceCreated {
    pub process_definition_key: String,
    #[serde(alias = "bpmnProcessId")]
    pub process_definition_id: String,
    pub process_definition_version: i32,
    pub process_instance_key: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

lossless_schema!(
    ProcessInstanceCreated,
    Schema::builder("ProcessInstanceCreated")
        .int64("processDefinitionKey")
        .int64("processInstanceKey")
        .build()
);

/// Completed process instance with its output variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "V: DeserializeOwned"))]
pub struct ProcessInstanceResult<V> {
    pub process_definition_key: String,
    #[serde(alias = "bpmnProcessId")]
    pub process_definition_id: String,
    pub process_definition_version: i32,
    pub process_instance_key: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub variables: V,
}

/// Message to correlate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMessage {
    pub name: String,
    pub correlation_key: String,
    /// Time to live in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl PublishMessage {
    pub fn new(name: impl Into<String>, correlation_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            correlation_key: correlation_key.into(),
            time_to_live: None,
            message_id: None,
            variables: None,
            tenant_id: None,
        }
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl.as_millis() as u64);
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

lossless_schema!(
    PublishMessage,
    Schema::builder("PublishMessage").plain("timeToLive").build()
);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePublished {
    pub message_key: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

lossless_schema!(
    MessagePublished,
    Schema::builder("MessagePublished").int64("messageKey").build()
);

/// Signal to broadcast
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSignal {
    pub signal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl BroadcastSignal {
    pub fn new(signal_name: impl Into<String>) -> Self {
        Self {
            signal_name: signal_name.into(),
            variables: None,
            tenant_id: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

lossless_schema!(BroadcastSignal, Schema::builder("BroadcastSignal").build());

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBroadcast {
    pub signal_key: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

lossless_schema!(
    SignalBroadcast,
    Schema::builder("SignalBroadcast").int64("signalKey").build()
);
