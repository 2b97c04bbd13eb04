//! Probe endpoints and the cross-cutting middleware stack.

mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn();

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["service"], "sales-service");
}

#[tokio::test]
async fn readiness_and_metrics_respond() {
    let app = TestApp::spawn();

    assert_eq!(app.get("/ready").await.status, StatusCode::OK);

    let metrics = app.get("/metrics").await;
    assert_eq!(metrics.status, StatusCode::OK);
    assert!(metrics.headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn();

    let response = app.get("/records/missing").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.headers.contains_key("x-request-id"));
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "DENY");
}
