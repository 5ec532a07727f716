//! End-to-end load tests against an in-process mock of the encryption service

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hsm_load_config::{HsmLoadConfig, ThinkTimeConfig};
use hsm_load_core::{names, Stage};
use hsm_load_runtime::{LoadTest, ShutdownCoordinator, ShutdownSignal};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Healthy,
    DropPlaintext,
    EncryptUnavailable,
}

struct MockService {
    behavior: Behavior,
    encrypt_calls: AtomicU64,
    decrypt_calls: AtomicU64,
}

impl MockService {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            encrypt_calls: AtomicU64::new(0),
            decrypt_calls: AtomicU64::new(0),
        })
    }
}

async fn encrypt(State(mock): State<Arc<MockService>>, Json(body): Json<Value>) -> Response {
    mock.encrypt_calls.fetch_add(1, Ordering::SeqCst);
    if mock.behavior == Behavior::EncryptUnavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "hsm offline").into_response();
    }
    let plaintext = body["plaintext"].as_str().unwrap_or_default();
    Json(json!({
        "ciphertext": plaintext.chars().rev().collect::<String>(),
        "key_id": "key-1",
    }))
    .into_response()
}

async fn decrypt(State(mock): State<Arc<MockService>>, Json(body): Json<Value>) -> Response {
    mock.decrypt_calls.fetch_add(1, Ordering::SeqCst);
    if mock.behavior == Behavior::DropPlaintext {
        return Json(json!({ "key_id": "key-1" })).into_response();
    }
    let ciphertext = body["ciphertext"].as_str().unwrap_or_default();
    Json(json!({ "plaintext": ciphertext.chars().rev().collect::<String>() })).into_response()
}

async fn spawn(mock: Arc<MockService>) -> String {
    let app = Router::new()
        .route("/encrypt", post(encrypt))
        .route("/decrypt", post(decrypt))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Three users for two seconds against `base`, plain HTTP
fn config(base: &str) -> HsmLoadConfig {
    let mut config = HsmLoadConfig::default();
    config.target.base_url = base.to_string();
    config.target.tls.client_cert = None;
    config.target.tls.client_key = None;
    config.http.timeout = Duration::from_secs(2);
    config.scenario.start_users = 3;
    config.scenario.stages = vec![Stage::new(ms(2000), 3), Stage::new(ms(500), 0)];
    config.scenario.tick = ms(100);
    config.scenario.graceful_stop = Duration::from_secs(7);
    config.scenario.think_time = ThinkTimeConfig::new(ms(10), ms(30));
    config.scenario.health_check_probability = 0.5;
    config.output.summary_json = None;
    config
}

#[tokio::test]
async fn test_healthy_service_passes_all_thresholds() {
    let mock = MockService::new(Behavior::Healthy);
    let base = spawn(mock.clone()).await;

    let test = LoadTest::from_config(&config(&base)).unwrap().with_seed(17);
    let result = test.run(&ShutdownCoordinator::new()).await;

    assert!(result.passed(), "{:?}", result.verdict);
    assert!(!result.aborted);
    assert_eq!(result.vus_max, 3);
    assert_eq!(result.timeline.last().map(|sample| sample.live), Some(0));

    let metrics = &result.metrics;
    let iterations = metrics.counter(names::ITERATIONS).unwrap();
    assert!(iterations > 10, "only {} iterations", iterations);
    assert_eq!(mock.encrypt_calls.load(Ordering::SeqCst), iterations);
    assert_eq!(metrics.counter(names::TOTAL_OPERATIONS), Some(iterations * 2));
    assert_eq!(metrics.trend(names::ENCRYPT_DURATION).unwrap().count, iterations);
    assert_eq!(metrics.rate(names::ERRORS), Some(0.0));
    assert_eq!(metrics.rate(names::HTTP_REQ_FAILED), Some(0.0));

    assert!(metrics.checks.values().all(|stats| stats.fails == 0));
    assert_eq!(metrics.checks["decrypt: plaintext matches"].passes, iterations);
    assert!(metrics.checks.contains_key("health: service ok"));
}

#[tokio::test]
async fn test_missing_plaintext_counts_as_round_trip_failure() {
    let mock = MockService::new(Behavior::DropPlaintext);
    let base = spawn(mock.clone()).await;

    let test = LoadTest::from_config(&config(&base)).unwrap().with_seed(3);
    let result = test.run(&ShutdownCoordinator::new()).await;

    let metrics = &result.metrics;
    let iterations = metrics.counter(names::ITERATIONS).unwrap();
    assert!(iterations > 0);
    assert_eq!(metrics.counter(names::ROUNDTRIP_FAILURES), Some(iterations));
    assert_eq!(metrics.counter(names::ENCRYPT_FAILURES), Some(0));
    assert_eq!(metrics.rate(names::ERRORS), Some(1.0));
    assert_eq!(metrics.checks["decrypt: has plaintext"].fails, iterations);
    assert_eq!(metrics.checks["decrypt: status 200"].fails, 0);

    assert!(!result.passed());
    assert!(result
        .verdict
        .failures()
        .any(|outcome| outcome.metric == names::ERRORS));
}

#[tokio::test]
async fn test_encrypt_outage_never_attempts_decrypt() {
    let mock = MockService::new(Behavior::EncryptUnavailable);
    let base = spawn(mock.clone()).await;

    let test = LoadTest::from_config(&config(&base)).unwrap();
    let result = test.run(&ShutdownCoordinator::new()).await;

    let metrics = &result.metrics;
    let iterations = metrics.counter(names::ITERATIONS).unwrap();
    assert_eq!(mock.decrypt_calls.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.counter(names::ENCRYPT_FAILURES), Some(iterations));
    assert_eq!(metrics.counter(names::TOTAL_OPERATIONS), Some(0));
    assert_eq!(metrics.checks["encrypt: status 200"].fails, iterations);
    assert!(metrics.rate(names::HTTP_REQ_FAILED).unwrap() > 0.5);
    assert!(!result.passed());
}

#[tokio::test]
async fn test_unreachable_service_is_recorded_not_fatal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let test = LoadTest::from_config(&config(&base)).unwrap();
    let result = test.run(&ShutdownCoordinator::new()).await;

    let metrics = &result.metrics;
    assert!(metrics.counter(names::ITERATIONS).unwrap() > 0);
    assert_eq!(metrics.rate(names::ERRORS), Some(1.0));
    assert!(metrics.trend(names::ENCRYPT_DURATION).map_or(true, |stats| stats.count == 0));
    assert!(!result.passed());
}

#[tokio::test]
async fn test_abort_ends_run_early() {
    let mock = MockService::new(Behavior::Healthy);
    let base = spawn(mock).await;

    let mut config = config(&base);
    config.scenario.stages = vec![Stage::new(Duration::from_secs(60), 3)];

    let shutdown = ShutdownCoordinator::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(ms(500)).await;
        trigger.trigger(ShutdownSignal::Graceful);
    });

    let test = LoadTest::from_config(&config).unwrap();
    let result = test.run(&shutdown).await;

    assert!(result.aborted);
    assert!(result.duration < Duration::from_secs(5), "{:?}", result.duration);
    assert!(result.metrics.counter(names::ITERATIONS).unwrap() > 0);
}
