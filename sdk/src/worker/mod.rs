//! Job worker: polling, handler dispatch and graceful shutdown

pub mod api;
pub mod handler;
pub mod hooks;
pub mod job;
pub mod job_worker;

pub use api::JobApi;
pub use handler::{HandlerError, HandlerResult, JobHandler};
pub use hooks::{HookChain, LoggingHook, WorkerEvent, WorkerHook};
pub use job::{ActivatedJob, Job, JobAction, JobActionReceipt};
pub use job_worker::{JobWorker, DEFAULT_STOP_DEADLINE};
