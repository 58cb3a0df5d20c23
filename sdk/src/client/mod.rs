//! REST client for the Camunda 8 orchestration cluster

pub mod builder;
pub mod rest;
pub mod transport;
pub mod types;

pub use builder::CamundaClientBuilder;
pub use rest::CamundaRestClient;
pub use transport::{AuthHook, RequestHook, RestTransport};
pub use types::{
    ActivateJobsRequest, BroadcastSignal, BrokerInfo, CreateProcessInstance, JobError,
    JobFailure, MessagePublished, Partition, ProcessInstanceCreated, ProcessInstanceResult,
    PublishMessage, SignalBroadcast, Topology,
};
