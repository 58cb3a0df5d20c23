//! Polling job worker.
//!
//! A worker polls for jobs of one type on a fixed interval, runs each job's
//! handler on its own task, and never holds more than
//! `max_jobs_to_activate` jobs at once. A handler that returns an error or
//! panics has its job failed automatically.

use super::api::JobApi;
use super::handler::JobHandler;
use super::hooks::{HookChain, WorkerEvent};
use super::job::{decrement_retries, ActivatedJob, Job, JobActionReceipt};
use crate::client::types::{ActivateJobsRequest, JobFailure};
use crate::config::JobWorkerConfig;
use crate::error::{Result, SdkError};
use camunda_core::codec::{job_schema, LosslessDto};
use camunda_core::SchemaRef;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Deadline for [`JobWorker::stop`] when the caller has no stronger opinion.
pub const DEFAULT_STOP_DEADLINE: Duration = Duration::from_secs(30);

/// Polls for and processes jobs of a single type.
///
/// `V` and `H` are the job's variables and custom headers; their schemas
/// decide which fields are decoded as 64-bit strings.
pub struct JobWorker<V, H> {
    shared: Arc<Shared<V, H>>,
    control: Mutex<Option<PollControl>>,
}

struct PollControl {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Shared<V, H> {
    config: JobWorkerConfig,
    api: Arc<dyn JobApi>,
    handler: Arc<dyn JobHandler<V, H>>,
    hooks: HookChain,
    schema: SchemaRef,
    active: AtomicUsize,
    running: AtomicBool,
    _types: PhantomData<fn() -> (V, H)>,
}

impl<V, H> JobWorker<V, H>
where
    V: LosslessDto + DeserializeOwned + Send + 'static,
    H: LosslessDto + DeserializeOwned + Send + 'static,
{
    /// Create a worker, starting it when `config.auto_start` is set.
    pub fn new<F>(
        config: JobWorkerConfig,
        api: Arc<dyn JobApi>,
        handler: F,
        hooks: HookChain,
    ) -> Result<Self>
    where
        F: JobHandler<V, H> + 'static,
    {
        config.validate()?;
        let auto_start = config.auto_start;
        let worker = Self {
            shared: Arc::new(Shared {
                schema: job_schema(&V::schema(), &H::schema()),
                config,
                api,
                handler: Arc::new(handler),
                hooks,
                active: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                _types: PhantomData,
            }),
            control: Mutex::new(None),
        };
        if auto_start {
            worker.start()?;
        }
        Ok(worker)
    }

    /// Start polling.
    ///
    /// Must be called within a Tokio runtime. Fails with
    /// [`SdkError::AlreadyRunning`] if the worker is already polling.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| {
            SdkError::InvalidConfiguration(
                "job worker must be started inside a Tokio runtime".to_string(),
            )
        })?;
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(SdkError::AlreadyRunning);
        }

        info!(
            task_type = %self.shared.config.task_type,
            worker = %self.shared.config.worker_name,
            max_jobs = self.shared.config.polling.max_jobs_to_activate,
            "Starting job worker"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(self.shared.clone().poll_loop(shutdown_rx));
        *self.control.lock() = Some(PollControl {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Stop polling and wait for in-flight jobs to finish.
    ///
    /// An activation request in progress is abandoned. Emits
    /// [`WorkerEvent::Stopped`] once drained; an idle or never-started worker
    /// resolves immediately. Returns
    /// [`SdkError::DrainTimeout`] if jobs are still active after `deadline`;
    /// those jobs keep running.
    pub async fn stop(&self, deadline: Duration) -> Result<()> {
        let control = self.control.lock().take();
        let shared = self.shared.clone();

        let drain = async move {
            if let Some(PollControl {
                shutdown_tx,
                handle,
            }) = control
            {
                let _ = shutdown_tx.send(true);
                if let Err(e) = handle.await {
                    warn!(error = %e, "Poll loop ended abnormally");
                }
            }
            shared.running.store(false, Ordering::SeqCst);
            shared.wait_for_drain().await;
        };

        match tokio::time::timeout(deadline, drain).await {
            Ok(()) => {
                info!(task_type = %self.shared.config.task_type, "Job worker stopped");
                self.shared
                    .hooks
                    .emit(WorkerEvent::Stopped {
                        task_type: self.shared.config.task_type.clone(),
                    })
                    .await;
                Ok(())
            }
            Err(_) => {
                self.shared.running.store(false, Ordering::SeqCst);
                let remaining = self.active_job_count();
                warn!(
                    task_type = %self.shared.config.task_type,
                    remaining,
                    "Job worker did not drain before the deadline"
                );
                Err(SdkError::DrainTimeout {
                    deadline,
                    remaining,
                })
            }
        }
    }
}

impl<V, H> JobWorker<V, H> {
    /// Jobs currently being handled
    pub fn active_job_count(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Check if the worker is polling
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &JobWorkerConfig {
        &self.shared.config
    }
}

impl<V, H> std::fmt::Debug for JobWorker<V, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWorker")
            .field("task_type", &self.shared.config.task_type)
            .field("running", &self.is_running())
            .field("active_jobs", &self.active_job_count())
            .finish()
    }
}

impl<V, H> Shared<V, H>
where
    V: LosslessDto + DeserializeOwned + Send + 'static,
    H: LosslessDto + DeserializeOwned + Send + 'static,
{
    async fn poll_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        self.hooks
            .emit(WorkerEvent::Started {
                task_type: self.config.task_type.clone(),
            })
            .await;

        let mut ticker = tokio::time::interval(self.config.polling.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("Abandoning activation request on shutdown");
                    break;
                }
                _ = self.poll_once() => {}
            }
        }
        debug!(task_type = %self.config.task_type, "Poll loop exited");
    }

    async fn poll_once(self: &Arc<Self>) {
        let max_jobs = self.config.polling.max_jobs_to_activate;
        let active_jobs = self.active.load(Ordering::SeqCst);
        let capacity = max_jobs.saturating_sub(active_jobs);

        self.hooks
            .emit(WorkerEvent::Poll {
                active_jobs,
                max_jobs,
                capacity,
            })
            .await;
        if capacity == 0 {
            return;
        }

        let request = self.activation_request(capacity);
        match self.api.activate_jobs(&request, &self.schema).await {
            Ok(mut jobs) => {
                let surplus = if jobs.len() > capacity {
                    jobs.split_off(capacity)
                } else {
                    Vec::new()
                };
                // No await between reserving capacity and spawning handlers.
                self.active.fetch_add(jobs.len(), Ordering::SeqCst);
                for raw in jobs {
                    let shared = self.clone();
                    tokio::spawn(async move { shared.handle_job(raw).await });
                }

                if !surplus.is_empty() {
                    warn!(
                        requested = capacity,
                        surplus = surplus.len(),
                        "Received more jobs than requested, returning the surplus"
                    );
                    for raw in surplus {
                        let shared = self.clone();
                        tokio::spawn(async move { shared.return_job(raw).await });
                    }
                }
            }
            Err(e) => {
                warn!(task_type = %self.config.task_type, error = %e, "Failed to activate jobs");
                self.hooks
                    .emit(WorkerEvent::PollError {
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    fn activation_request(&self, capacity: usize) -> ActivateJobsRequest {
        let polling = &self.config.polling;
        ActivateJobsRequest {
            job_type: self.config.task_type.clone(),
            worker: self.config.worker_name.clone(),
            timeout: polling.job_timeout.as_millis() as u64,
            max_jobs_to_activate: capacity,
            fetch_variables: self.config.fetch_variables.clone(),
            request_timeout: polling.request_timeout.as_millis() as u64,
            tenant_ids: self.config.tenant_ids.clone(),
        }
    }

    /// Hand a job the worker has no capacity for back to the engine,
    /// retries unchanged.
    async fn return_job(self: Arc<Self>, raw: Value) {
        let key = job_key(&raw);
        let failure = JobFailure::new("Job returned: worker at capacity")
            .with_retries(job_retries(&raw));
        if let Err(e) = self.api.fail_job(&key, &failure).await {
            warn!(job_key = %key, error = %e, "Failed to return surplus job");
        }
    }

    async fn handle_job(self: Arc<Self>, raw: Value) {
        let key = job_key(&raw);
        let retries = job_retries(&raw);
        let span = info_span!(
            "job",
            job_key = %key,
            job_type = %self.config.task_type,
            worker = %self.config.worker_name
        );

        match self.run_handler(raw, span.clone()).await {
            Ok(receipt) => {
                debug!(parent: &span, action = ?receipt.action(), "Job handled");
            }
            Err(message) => {
                error!(parent: &span, error = %message, "Job handler failed");
                let failure =
                    JobFailure::new(message).with_retries(decrement_retries(retries));
                if let Err(e) = self
                    .api
                    .fail_job(&key, &failure)
                    .instrument(span.clone())
                    .await
                {
                    error!(parent: &span, error = %e, "Failed to report job failure");
                }
            }
        }
        self.release();
    }

    async fn run_handler(
        &self,
        raw: Value,
        span: Span,
    ) -> std::result::Result<JobActionReceipt, String> {
        let activated: ActivatedJob<V, H> =
            serde_json::from_value(raw).map_err(|e| format!("Failed to decode job: {e}"))?;
        let job = Job::new(activated, self.api.clone(), span.clone());
        let handler = self.handler.clone();

        // Own task, so a panicking handler is caught by the join.
        let task = tokio::spawn(async move { handler.handle(job).await }.instrument(span));
        match task.await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err(panic_message(e.into_panic())),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl<V, H> Shared<V, H> {
    fn release(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    async fn wait_for_drain(&self) {
        while self.active.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(self.config.polling.drain_check_interval).await;
        }
    }
}

fn job_key(raw: &Value) -> String {
    raw.get("jobKey")
        .or_else(|| raw.get("key"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn job_retries(raw: &Value) -> i32 {
    raw.get("retries")
        .and_then(Value::as_i64)
        .map(|r| r.clamp(0, i32::MAX as i64) as i32)
        .unwrap_or(0)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Job handler panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollingConfig;
    use crate::testing::{JobBuilder, MockJobApi};
    use crate::worker::HandlerResult;
    use serde_json::json;

    fn config(max_jobs: usize) -> JobWorkerConfig {
        JobWorkerConfig::new("payment")
            .unwrap()
            .with_auto_start(false)
            .with_polling(PollingConfig {
                max_jobs_to_activate: max_jobs,
                poll_interval: Duration::from_millis(100),
                ..PollingConfig::DEFAULT
            })
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(
            panic_message(Box::new("boom")),
            "Job handler panicked: boom"
        );
        assert_eq!(
            panic_message(Box::new(String::from("bang"))),
            "Job handler panicked: bang"
        );
        assert_eq!(
            panic_message(Box::new(7u8)),
            "Job handler panicked: unknown panic"
        );
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let api = Arc::new(MockJobApi::new());
        let worker: JobWorker<Value, Value> = JobWorker::new(
            config(1),
            api,
            |job: Job<Value, Value>| async move { HandlerResult::Ok(job.forward()) },
            HookChain::new(),
        )
        .unwrap();
        assert!(matches!(
            worker.start(),
            Err(SdkError::InvalidConfiguration(_))
        ));
        assert!(!worker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_request_uses_capacity() {
        let api = Arc::new(MockJobApi::new());
        api.push_job(JobBuilder::new("payment").key("1").build_raw());

        let worker: JobWorker<Value, Value> = JobWorker::new(
            config(4).with_fetch_variables(["orderId"]),
            api.clone(),
            |job: Job<Value, Value>| async move { HandlerResult::Ok(job.complete(&json!({})).await?) },
            HookChain::new(),
        )
        .unwrap();
        worker.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.stop(Duration::from_secs(1)).await.unwrap();

        let requests = api.activation_requests();
        assert!(!requests.is_empty());
        assert_eq!(requests[0].max_jobs_to_activate, 4);
        assert_eq!(requests[0].job_type, "payment");
        assert_eq!(requests[0].fetch_variables, Some(vec!["orderId".to_string()]));
        assert_eq!(api.completed().len(), 1);
    }
}
