//! REST client tests against a mock cluster.
//!
//! Covers authentication headers, RFC 7807 problem enrichment, lossless
//! decoding of 64-bit keys and a worker polling over HTTP end to end.

use async_trait::async_trait;
use camunda_sdk::client::types::ActivateJobsRequest;
use camunda_sdk::{
    AuthStrategy, BroadcastSignal, CamundaClientBuilder, CamundaRestClient, CreateProcessInstance,
    HandlerResult, Job, JobApi, JobError, JobFailure, JobWorkerConfig, LosslessDto, OAuthConfig,
    PollingConfig, PublishMessage, RequestHook, Schema, SchemaRef, SdkError,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BIG_KEY: &str = "2251799813685249123";

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: u64,
}

fn test_jwt() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    encode(
        &Header::default(),
        &Claims {
            sub: "worker".to_string(),
            exp: now + 3600,
        },
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

fn client(server: &MockServer) -> CamundaRestClient {
    CamundaClientBuilder::new()
        .rest_address(server.uri())
        .build()
        .unwrap()
}

fn job_json() -> Value {
    serde_json::from_str(&format!(
        r#"{{
            "jobKey": {BIG_KEY},
            "type": "payment",
            "processInstanceKey": 2251799813685249000,
            "processDefinitionKey": 2251799813685240001,
            "processDefinitionId": "order",
            "processDefinitionVersion": 2,
            "elementId": "charge",
            "elementInstanceKey": 2251799813685249100,
            "customHeaders": {{"region": "eu"}},
            "worker": "billing",
            "retries": 3,
            "deadline": 1700000000000,
            "variables": {{"amount": 12.5}},
            "tenantId": "<default>"
        }}"#
    ))
    .unwrap()
}

#[tokio::test]
async fn oauth_bearer_header_is_sent() {
    let server = MockServer::start().await;
    let jwt = test_jwt();
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": jwt,
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/topology"))
        .and(header("authorization", format!("Bearer {jwt}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "brokers": [{
                "nodeId": 0,
                "host": "zeebe",
                "port": 26501,
                "partitions": [{"partitionId": 1, "role": "leader", "health": "healthy"}],
                "version": "8.6.0"
            }],
            "clusterSize": 1,
            "partitionsCount": 1,
            "replicationFactor": 1,
            "gatewayVersion": "8.6.0"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let oauth = OAuthConfig::new(format!("{}/oauth/token", server.uri()))
        .with_credentials("zeebe-client", "zeebe-secret")
        .without_cache_dir();
    let client = CamundaClientBuilder::new()
        .rest_address(server.uri())
        .auth_strategy(AuthStrategy::OAuth(oauth))
        .build()
        .unwrap();

    let topology = client.topology().await.unwrap();
    assert_eq!(topology.cluster_size, 1);
    assert_eq!(topology.brokers[0].partitions[0].role, "leader");

    // Second call is served from the token cache
    client.topology().await.unwrap();
}

#[tokio::test]
async fn basic_auth_and_custom_hook() {
    struct TraceHook;

    #[async_trait]
    impl RequestHook for TraceHook {
        async fn before_request(&self, request: &mut reqwest::Request) -> camunda_sdk::Result<()> {
            request
                .headers_mut()
                .insert("x-trace-id", reqwest::header::HeaderValue::from_static("abc"));
            Ok(())
        }
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/process-instances/5/cancellation"))
        .and(header("authorization", "Basic ZGVtbzpkZW1v"))
        .and(header("x-trace-id", "abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = CamundaClientBuilder::new()
        .rest_address(server.uri())
        .auth_strategy(AuthStrategy::Basic {
            username: "demo".into(),
            password: "demo".into(),
        })
        .request_hook(TraceHook)
        .build()
        .unwrap();
    client.cancel_process_instance("5").await.unwrap();
}

#[tokio::test]
async fn problem_documents_become_typed_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/jobs/123/completion"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/problem+json")
                .set_body_string(
                    r#"{"type":"about:blank","title":"NOT_FOUND","status":404,
                        "detail":"Job with key '123' not found","instance":"/v2/jobs/123/completion"}"#,
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/jobs/123/failure"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.complete_job("123", json!({})).await.unwrap_err();
    match &err {
        SdkError::Problem(problem) => {
            assert_eq!(problem.title.as_deref(), Some("NOT_FOUND"));
            assert_eq!(problem.status, Some(404));
            assert_eq!(problem.detail.as_deref(), Some("Job with key '123' not found"));
        }
        other => panic!("expected problem, got {other:?}"),
    }
    assert!(!err.is_retryable());

    let err = client
        .fail_job("123", &JobFailure::new("boom"))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Status { status: 502, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn activated_job_keys_keep_full_precision() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/jobs/activation"))
        .and(body_string_contains(r#""maxJobsToActivate":5"#))
        .and(body_string_contains(r#""type":"payment""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [job_json()] })))
        .mount(&server)
        .await;

    let request = ActivateJobsRequest {
        job_type: "payment".to_string(),
        worker: "billing".to_string(),
        timeout: 60_000,
        max_jobs_to_activate: 5,
        fetch_variables: None,
        request_timeout: 10_000,
        tenant_ids: None,
    };
    let jobs = client(&server)
        .activate_jobs_typed::<Value, Value>(&request)
        .await
        .unwrap();

    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.key, BIG_KEY);
    assert_eq!(job.process_instance_key, "2251799813685249000");
    assert_eq!(job.element_instance_key, "2251799813685249100");
    assert_eq!(job.deadline, 1_700_000_000_000);
    assert_eq!(job.custom_headers["region"], "eu");
    assert_eq!(job.variables["amount"], json!(12.5));
}

#[tokio::test]
async fn unsafe_unannotated_variable_is_refused() {
    let server = MockServer::start().await;
    let mut job = job_json();
    job["variables"] = serde_json::from_str(r#"{"total": 9007199254740993}"#).unwrap();
    Mock::given(method("POST"))
        .and(path("/v2/jobs/activation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [job] })))
        .mount(&server)
        .await;

    let request = ActivateJobsRequest {
        job_type: "payment".to_string(),
        worker: "billing".to_string(),
        timeout: 60_000,
        max_jobs_to_activate: 1,
        fetch_variables: None,
        request_timeout: 10_000,
        tenant_ids: None,
    };
    let err = client(&server)
        .activate_jobs(&request, &Schema::opaque())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("variables.total"));
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    order_key: String,
    status: String,
}

impl LosslessDto for OrderResult {
    fn schema() -> SchemaRef {
        static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
        SCHEMA
            .get_or_init(|| Schema::builder("OrderResult").int64("orderKey").build())
            .clone()
    }
}

#[tokio::test]
async fn process_instance_with_result_decodes_variables() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/process-instances"))
        .and(body_string_contains(r#""awaitCompletion":true"#))
        .and(body_string_contains(r#""tenantId":"finance""#))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"processDefinitionKey": 2251799813685240001, "processDefinitionId": "order",
                "processDefinitionVersion": 2, "processInstanceKey": 2251799813685249999,
                "tenantId": "finance",
                "variables": {"orderKey": 9223372036854775807, "status": "shipped"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = CamundaClientBuilder::new()
        .rest_address(server.uri())
        .tenant_id("finance")
        .build()
        .unwrap();
    let result = client
        .create_process_instance_with_result::<OrderResult>(
            CreateProcessInstance::by_id("order").with_variables(json!({"orderId": "A-1"})),
        )
        .await
        .unwrap();

    assert_eq!(result.process_instance_key, "2251799813685249999");
    assert_eq!(result.variables.order_key, "9223372036854775807");
    assert_eq!(result.variables.status, "shipped");
}

#[tokio::test]
async fn create_by_key_sends_bare_integer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/process-instances"))
        .and(body_string_contains(&format!(r#""processDefinitionKey":{BIG_KEY}"#)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"processDefinitionKey": {BIG_KEY}, "processDefinitionId": "order",
                "processDefinitionVersion": 1, "processInstanceKey": 2251799813685249555}}"#
        )))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create_process_instance(CreateProcessInstance::by_key(BIG_KEY))
        .await
        .unwrap();
    assert_eq!(created.process_definition_key, BIG_KEY);
    assert_eq!(created.process_instance_key, "2251799813685249555");
}

#[tokio::test]
async fn messages_signals_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/messages/publication"))
        .and(body_string_contains(r#""correlationKey":"A-1""#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"messageKey": 2251799813685250001, "tenantId": "<default>"}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/signals/broadcast"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"signalKey": 2251799813685250002}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/v2/jobs/{BIG_KEY}")))
        .and(body_string_contains(r#""changeset":{"retries":5}"#))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let published = client
        .publish_message(PublishMessage::new("order-paid", "A-1"))
        .await
        .unwrap();
    assert_eq!(published.message_key, "2251799813685250001");

    let signal = client
        .broadcast_signal(BroadcastSignal::new("shutdown"))
        .await
        .unwrap();
    assert_eq!(signal.signal_key, "2251799813685250002");

    client.update_job_retries(BIG_KEY, 5).await.unwrap();
}

#[tokio::test]
async fn job_failure_and_error_bodies_are_encoded_by_the_codec() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/jobs/{BIG_KEY}/failure")))
        .and(body_string_contains(r#""retries":2"#))
        .and(body_string_contains(r#""retryBackOff":1500"#))
        .and(body_string_contains(&format!(r#""orderKey":{BIG_KEY}"#)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/jobs/{BIG_KEY}/error")))
        .and(body_string_contains(r#""errorCode":"OUT_OF_STOCK""#))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let variables: Value = serde_json::from_str(&format!(r#"{{"orderKey": {BIG_KEY}}}"#)).unwrap();
    let client = client(&server);
    client
        .fail_job(
            BIG_KEY,
            &JobFailure::new("card declined")
                .with_retries(2)
                .with_retry_back_off(Duration::from_millis(1500))
                .with_variables(variables),
        )
        .await
        .unwrap();
    client
        .throw_job_error(BIG_KEY, &JobError::new("OUT_OF_STOCK"))
        .await
        .unwrap();
}

#[tokio::test]
async fn worker_completes_jobs_over_http() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("camunda_sdk=debug,camunda_core=debug")
        .with_test_writer()
        .try_init();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/jobs/activation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [job_json()] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/jobs/activation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/jobs/{BIG_KEY}/completion")))
        .and(body_string_contains(r#""charged":12.5"#))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = JobWorkerConfig::new("payment")
        .unwrap()
        .with_auto_start(false)
        .with_polling(PollingConfig {
            poll_interval: Duration::from_millis(50),
            drain_check_interval: Duration::from_millis(20),
            ..PollingConfig::DEFAULT
        });
    let worker = client(&server)
        .job_worker(config, |job: Job<Value, Value>| async move {
            let amount = job.variables["amount"].clone();
            HandlerResult::Ok(job.complete(&json!({ "charged": amount })).await?)
        })
        .unwrap();
    worker.start().unwrap();

    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default();
        if received
            .iter()
            .any(|r| r.url.path() == format!("/v2/jobs/{BIG_KEY}/completion"))
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    worker.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(worker.active_job_count(), 0);
}
