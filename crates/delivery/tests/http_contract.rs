//! Webhook delivery over real HTTP against a local mock endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_core::config::RetryStrategy;
use relay_core::MeetingRecord;
use relay_delivery::signing;
use relay_delivery::{DeliveryEngine, DeliveryTarget, HttpTransport, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "shared-secret";

fn engine(url: String, max_attempts: u32) -> DeliveryEngine {
    let timeout = Duration::from_secs(2);
    DeliveryEngine::new(
        Arc::new(HttpTransport::new(timeout).unwrap()),
        RetryPolicy::new(RetryStrategy::Exponential, Duration::from_millis(5), max_attempts),
        DeliveryTarget {
            url,
            headers: BTreeMap::from([("X-Source".to_string(), "meeting-relay".to_string())]),
            secret: SECRET.to_string(),
            signature_header: "X-Webhook-Signature".to_string(),
            include_transcript: true,
            attempt_timeout: timeout,
        },
    )
}

fn meeting() -> MeetingRecord {
    let mut m = MeetingRecord::new("m-100", "OMAI weekly", Utc::now());
    m.transcript = Some("hello".to_string());
    m
}

#[tokio::test]
async fn posts_signed_json_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meetings"))
        .and(header("X-Source", "meeting-relay"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "meetingId": "m-100",
            "title": "OMAI weekly",
            "organization": "OMAI",
            "transcript": "hello"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let report = engine(format!("{}/meetings", server.uri()), 3)
        .deliver(&meeting(), "OMAI")
        .await;
    assert!(report.succeeded());
    assert_eq!(report.attempt_count(), 1);

    let requests = server.received_requests().await.unwrap();
    let signature = requests[0]
        .headers
        .get("X-Webhook-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(signature.starts_with("sha256="));
    assert!(signing::verify(&requests[0].body, SECRET, signature));
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let report = engine(server.uri(), 3).deliver(&meeting(), "OMAI").await;
    assert!(!report.succeeded());
    assert_eq!(report.attempt_count(), 3);
    assert_eq!(report.final_outcome().unwrap().http_status, Some(503));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = engine(server.uri(), 5).deliver(&meeting(), "OMAI").await;
    assert!(!report.succeeded());
    assert_eq!(report.attempt_count(), 1);
}
