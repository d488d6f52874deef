//! Operational endpoints and cross-cutting middleware.

mod common;

use axum::http::{header, StatusCode};
use common::TestApp;
use service_core::middleware::tracing::REQUEST_ID_HEADER;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "store-service");
}

#[tokio::test]
async fn ready_when_store_answers() {
    let app = TestApp::spawn().await;

    let response = app.get("/ready").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ready");
}

#[tokio::test]
async fn metrics_are_exposed_as_text() {
    let app = TestApp::spawn().await;
    app.get("/health").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn stats_count_seeded_records() {
    let app = TestApp::spawn().await;
    let today = chrono::Local::now().date_naive();
    let response = app
        .post(
            "/invoices",
            serde_json::json!({ "employeeId": common::EMPLOYEE_ID, "date": today }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    // Generated ids use the HD prefix
    assert!(response.json()["id"].as_str().unwrap().starts_with("HD"));
    app.create_invoice("HD500").await;

    let response = app.get("/stats").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["customers"], 1);
    assert_eq!(body["employees"], 1);
    assert_eq!(body["products"], 3);
    // HD500 is dated 2024-06-10
    assert_eq!(body["invoicesThisMonth"], 1);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert!(response.headers.contains_key(REQUEST_ID_HEADER));
    assert_eq!(response.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers[header::X_FRAME_OPTIONS], "DENY");
    assert!(!response.headers.contains_key(header::CACHE_CONTROL));
}

#[tokio::test]
async fn unknown_employee_cannot_issue_invoices() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/invoices", serde_json::json!({ "employeeId": "NV99" }))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_invoice_id_is_a_conflict() {
    let app = TestApp::spawn().await;
    app.create_invoice("HD501").await;

    let response = app
        .post(
            "/invoices",
            serde_json::json!({ "id": "HD501", "employeeId": common::EMPLOYEE_ID }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}
