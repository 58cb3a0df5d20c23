//! Testing utilities for job handlers and workers.
//!
//! - [`MockJobApi`] - in-memory [`JobApi`](crate::worker::JobApi) that hands
//!   out queued jobs and records every job action
//! - [`JobBuilder`] - fluent construction of activated jobs

mod builders;
mod mock_job_api;

pub use builders::JobBuilder;
pub use mock_job_api::MockJobApi;
