//! Job handler trait.

use super::job::{Job, JobActionReceipt};
use async_trait::async_trait;
use std::future::Future;

/// Error a handler may return; the worker fails the job with its message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of handling a job.
pub type HandlerResult = Result<JobActionReceipt, HandlerError>;

/// Processes activated jobs.
///
/// Implemented for any `Fn(Job<V, H>) -> impl Future<Output = HandlerResult>`,
/// so plain async closures work:
///
/// ```ignore
/// let handler = |job: Job<Value, Value>| async move {
///     HandlerResult::Ok(job.complete(&json!({"paid": true})).await?)
/// };
/// ```
#[async_trait]
pub trait JobHandler<V, H>: Send + Sync {
    async fn handle(&self, job: Job<V, H>) -> HandlerResult;
}

#[async_trait]
impl<V, H, F, Fut> JobHandler<V, H> for F
where
    V: Send + 'static,
    H: Send + 'static,
    F: Fn(Job<V, H>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, job: Job<V, H>) -> HandlerResult {
        (self)(job).await
    }
}
