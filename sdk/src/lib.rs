//! Camunda 8 SDK for Rust
//!
//! This SDK provides a REST client for the Camunda 8 orchestration cluster
//! and a polling job worker. JSON is encoded and decoded losslessly, so
//! 64-bit keys and arbitrary-precision integers survive the round trip.
//! Authentication (OAuth client credentials, basic, none) comes from
//! [`camunda_core`].

#![allow(clippy::result_large_err)]

pub mod client;
pub mod config;
pub mod error;
pub mod worker;

/// Mock job API and job builders for testing handlers.
/// Available only with the `testing` feature enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use error::{ProblemDetail, Result, SdkError};

// Re-export config types
pub use config::{ClientConfig, ConfigError, JobWorkerConfig, PollingConfig};

// Re-export client types
pub use client::{
    ActivateJobsRequest, BroadcastSignal, CamundaClientBuilder, CamundaRestClient,
    CreateProcessInstance, JobError, JobFailure, MessagePublished, ProcessInstanceCreated,
    ProcessInstanceResult, PublishMessage, RequestHook, SignalBroadcast, Topology,
};

// Re-export worker types
pub use worker::{
    ActivatedJob, HandlerError, HandlerResult, HookChain, Job, JobAction, JobActionReceipt,
    JobApi, JobHandler, JobWorker, LoggingHook, WorkerEvent, WorkerHook,
};

// Re-export core types
pub use camunda_core::codec::{LosslessDto, Schema, SchemaRef};
pub use camunda_core::{
    Audience, AuthProvider, AuthStrategy, BasicAuthProvider, NullAuthProvider, OAuthConfig,
    OAuthProvider,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{
        CamundaClientBuilder, CamundaRestClient, CreateProcessInstance, JobError, JobFailure,
        PublishMessage,
    };
    pub use crate::config::{ClientConfig, JobWorkerConfig, PollingConfig};
    pub use crate::error::{Result, SdkError};
    pub use crate::worker::{
        HandlerResult, HookChain, Job, JobActionReceipt, JobHandler, JobWorker, LoggingHook,
        WorkerEvent, WorkerHook,
    };
    pub use async_trait::async_trait;
    pub use camunda_core::codec::{LosslessDto, Schema, SchemaRef};
    pub use camunda_core::AuthStrategy;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Map, Value};
}
