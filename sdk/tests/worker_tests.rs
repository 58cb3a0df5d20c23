//! Job worker behavior tests
//!
//! Run against `MockJobApi` with paused Tokio time, covering the capacity
//! bound, automatic failure of erroring and panicking handlers, drain on
//! stop and worker events.

use async_trait::async_trait;
use camunda_sdk::testing::{JobBuilder, MockJobApi};
use camunda_sdk::{
    HandlerResult, HookChain, Job, JobWorker, JobWorkerConfig, PollingConfig, SdkError,
    WorkerEvent, WorkerHook,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingHook {
    events: Mutex<Vec<WorkerEvent>>,
}

impl RecordingHook {
    fn events(&self) -> Vec<WorkerEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl WorkerHook for RecordingHook {
    async fn on_event(&self, event: &WorkerEvent) {
        self.events.lock().push(event.clone());
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("camunda_sdk=debug")
        .with_test_writer()
        .try_init();
}

fn config(max_jobs: usize) -> JobWorkerConfig {
    JobWorkerConfig::new("payment")
        .unwrap()
        .with_auto_start(false)
        .with_polling(PollingConfig {
            max_jobs_to_activate: max_jobs,
            poll_interval: Duration::from_millis(100),
            drain_check_interval: Duration::from_millis(50),
            ..PollingConfig::DEFAULT
        })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn active_jobs_never_exceed_capacity() {
    let api = Arc::new(MockJobApi::new());
    api.push_jobs((0..7).map(|i| JobBuilder::new("payment").key(i.to_string()).build_raw()));

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let handler = {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        move |job: Job<Value, Value>| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                HandlerResult::Ok(job.complete(&json!({"done": true})).await?)
            }
        }
    };

    let worker = JobWorker::new(config(2), api.clone(), handler, HookChain::new()).unwrap();
    worker.start().unwrap();

    wait_until(|| api.completed().len() == 7).await;
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(api
        .activation_requests()
        .iter()
        .all(|r| r.max_jobs_to_activate >= 1 && r.max_jobs_to_activate <= 2));

    worker.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(worker.active_job_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn surplus_jobs_are_returned_with_retries_unchanged() {
    init_tracing();
    let api = Arc::new(MockJobApi::new());
    api.ignore_activation_limit();
    api.push_jobs((0..5).map(|i| {
        JobBuilder::new("payment")
            .key(i.to_string())
            .retries(4)
            .build_raw()
    }));

    let worker = JobWorker::new(
        config(2),
        api.clone(),
        |job: Job<Value, Value>| async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            HandlerResult::Ok(job.complete(&json!({})).await?)
        },
        HookChain::new(),
    )
    .unwrap();
    worker.start().unwrap();

    wait_until(|| api.failed().len() == 3).await;
    assert!(worker.active_job_count() <= 2);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(worker.active_job_count() <= 2);

    let failed = api.failed();
    let mut returned: Vec<&str> = failed.iter().map(|(key, _)| key.as_str()).collect();
    returned.sort_unstable();
    assert_eq!(returned, vec!["2", "3", "4"]);
    assert!(failed.iter().all(|(_, f)| f.retries == Some(4)));

    wait_until(|| api.completed().len() == 2).await;
    worker.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(worker.active_job_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn saturated_worker_skips_activation() {
    let api = Arc::new(MockJobApi::new());
    api.push_job(JobBuilder::new("payment").key("1").build_raw());
    let hook = Arc::new(RecordingHook::default());
    let mut hooks = HookChain::new();
    hooks.add_arc(hook.clone());

    let worker = JobWorker::new(
        config(1),
        api.clone(),
        |job: Job<Value, Value>| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            HandlerResult::Ok(job.complete(&json!({})).await?)
        },
        hooks,
    )
    .unwrap();
    worker.start().unwrap();

    wait_until(|| worker.active_job_count() == 1).await;
    let requests_before = api.activation_requests().len();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(api.activation_requests().len(), requests_before);
    assert!(hook.events().iter().any(|e| matches!(
        e,
        WorkerEvent::Poll {
            active_jobs: 1,
            max_jobs: 1,
            capacity: 0
        }
    )));
    worker.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn erroring_handler_fails_job_with_decremented_retries() {
    init_tracing();
    let api = Arc::new(MockJobApi::new());
    api.push_job(JobBuilder::new("payment").key("42").retries(3).build_raw());

    let worker = JobWorker::new(
        config(4),
        api.clone(),
        |_job: Job<Value, Value>| async move { HandlerResult::Err("card declined".into()) },
        HookChain::new(),
    )
    .unwrap();
    worker.start().unwrap();

    wait_until(|| api.failed().len() == 1).await;
    let (key, failure) = &api.failed()[0];
    assert_eq!(key, "42");
    assert_eq!(failure.retries, Some(2));
    assert_eq!(failure.error_message, "card declined");

    worker.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(worker.active_job_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_handler_fails_job() {
    let api = Arc::new(MockJobApi::new());
    api.push_job(JobBuilder::new("payment").key("7").retries(0).build_raw());

    let worker = JobWorker::new(
        config(4),
        api.clone(),
        |_job: Job<Value, Value>| async move {
            if true {
                panic!("unexpected state");
            }
            HandlerResult::Err("unreachable".into())
        },
        HookChain::new(),
    )
    .unwrap();
    worker.start().unwrap();

    wait_until(|| api.failed().len() == 1).await;
    let (key, failure) = &api.failed()[0];
    assert_eq!(key, "7");
    assert_eq!(failure.retries, Some(0));
    assert!(failure.error_message.contains("unexpected state"));

    worker.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(worker.active_job_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn undecodable_job_is_failed() {
    #[derive(serde::Deserialize)]
    #[allow(dead_code)]
    struct Order {
        order_id: String,
    }
    impl camunda_sdk::LosslessDto for Order {
        fn schema() -> camunda_sdk::SchemaRef {
            camunda_sdk::Schema::opaque()
        }
    }

    let api = Arc::new(MockJobApi::new());
    api.push_job(
        JobBuilder::new("payment")
            .key("9")
            .variables(json!({"unrelated": 1}))
            .build_raw(),
    );

    let worker = JobWorker::new(
        config(4),
        api.clone(),
        |job: Job<Order, Value>| async move { HandlerResult::Ok(job.forward()) },
        HookChain::new(),
    )
    .unwrap();
    worker.start().unwrap();

    wait_until(|| api.failed().len() == 1).await;
    assert!(api.failed()[0].1.error_message.contains("decode"));
    worker.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_jobs() {
    init_tracing();
    let api = Arc::new(MockJobApi::new());
    api.push_job(JobBuilder::new("payment").key("1").build_raw());
    let hook = Arc::new(RecordingHook::default());
    let mut hooks = HookChain::new();
    hooks.add_arc(hook.clone());

    let worker = JobWorker::new(
        config(4),
        api.clone(),
        |job: Job<Value, Value>| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            HandlerResult::Ok(job.complete(&json!({"ok": true})).await?)
        },
        hooks,
    )
    .unwrap();
    worker.start().unwrap();
    wait_until(|| worker.active_job_count() == 1).await;

    worker.stop(Duration::from_secs(5)).await.unwrap();
    assert!(!worker.is_running());
    assert_eq!(worker.active_job_count(), 0);
    assert_eq!(api.completed().len(), 1);

    let events = hook.events();
    assert_eq!(
        events.first(),
        Some(&WorkerEvent::Started {
            task_type: "payment".into()
        })
    );
    assert_eq!(
        events.last(),
        Some(&WorkerEvent::Stopped {
            task_type: "payment".into()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn stop_reports_drain_timeout() {
    let api = Arc::new(MockJobApi::new());
    api.push_job(JobBuilder::new("payment").key("1").build_raw());

    let worker = JobWorker::new(
        config(4),
        api.clone(),
        |job: Job<Value, Value>| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            HandlerResult::Ok(job.complete(&json!({})).await?)
        },
        HookChain::new(),
    )
    .unwrap();
    worker.start().unwrap();
    wait_until(|| worker.active_job_count() == 1).await;

    let err = worker.stop(Duration::from_secs(1)).await.unwrap_err();
    match err {
        SdkError::DrainTimeout {
            deadline,
            remaining,
        } => {
            assert_eq!(deadline, Duration::from_secs(1));
            assert_eq!(remaining, 1);
        }
        other => panic!("expected drain timeout, got {other}"),
    }
    assert!(!worker.is_running());
}

#[tokio::test(start_paused = true)]
async fn stop_abandons_pending_activation() {
    let api = Arc::new(MockJobApi::new());
    api.delay_activations(Duration::from_secs(30));
    api.push_job(JobBuilder::new("payment").build_raw());

    let worker = JobWorker::new(
        config(4),
        api.clone(),
        |job: Job<Value, Value>| async move { HandlerResult::Ok(job.forward()) },
        HookChain::new(),
    )
    .unwrap();
    worker.start().unwrap();
    wait_until(|| !api.activation_requests().is_empty()).await;

    worker.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(api.pending_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected() {
    let api = Arc::new(MockJobApi::new());
    let worker = JobWorker::new(
        config(1),
        api,
        |job: Job<Value, Value>| async move { HandlerResult::Ok(job.forward()) },
        HookChain::new(),
    )
    .unwrap();

    worker.start().unwrap();
    assert!(worker.is_running());
    assert!(matches!(worker.start(), Err(SdkError::AlreadyRunning)));

    worker.stop(Duration::from_secs(1)).await.unwrap();
    worker.start().unwrap();
    worker.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_on_idle_worker_emits_stopped() {
    let hook = Arc::new(RecordingHook::default());
    let mut hooks = HookChain::new();
    hooks.add_arc(hook.clone());
    let worker = JobWorker::new(
        config(1),
        Arc::new(MockJobApi::new()),
        |job: Job<Value, Value>| async move { HandlerResult::Ok(job.forward()) },
        hooks,
    )
    .unwrap();

    worker.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(
        hook.events(),
        vec![WorkerEvent::Stopped {
            task_type: "payment".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn auto_start_begins_polling() {
    let api = Arc::new(MockJobApi::new());
    api.push_job(JobBuilder::new("payment").key("1").build_raw());

    let worker = JobWorker::new(
        config(1).with_auto_start(true),
        api.clone(),
        |job: Job<Value, Value>| async move { HandlerResult::Ok(job.complete(&json!({})).await?) },
        HookChain::new(),
    )
    .unwrap();
    assert!(worker.is_running());

    wait_until(|| api.completed().len() == 1).await;
    worker.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn poll_errors_are_reported_and_polling_continues() {
    init_tracing();
    let api = Arc::new(MockJobApi::new());
    api.fail_activations("gateway unavailable");
    let hook = Arc::new(RecordingHook::default());
    let mut hooks = HookChain::new();
    hooks.add_arc(hook.clone());

    let worker = JobWorker::new(
        config(2),
        api.clone(),
        |job: Job<Value, Value>| async move { HandlerResult::Ok(job.complete(&json!({})).await?) },
        hooks,
    )
    .unwrap();
    worker.start().unwrap();

    wait_until(|| api.activation_requests().len() >= 3).await;
    let errors: Vec<_> = hook
        .events()
        .into_iter()
        .filter_map(|e| match e {
            WorkerEvent::PollError { error } => Some(error),
            _ => None,
        })
        .collect();
    assert!(errors.len() >= 2);
    assert!(errors[0].contains("gateway unavailable"));

    api.clear_activation_error();
    api.push_job(JobBuilder::new("payment").key("1").build_raw());
    wait_until(|| api.completed().len() == 1).await;

    worker.stop(Duration::from_secs(1)).await.unwrap();
}
