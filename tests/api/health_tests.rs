//! Health Check API Tests

use axum::http::StatusCode;
use crud_backends::config::CatalogName;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new(CatalogName::Crm);

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new(CatalogName::Crm);

    let response = app.server.get("/health/live").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_catalog_and_store() {
    let app = TestApp::new(CatalogName::Reservation);

    let response = app.server.get("/health/ready").await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["catalog"], "reservation");
    assert_eq!(body["checks"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_request_counters() {
    let app = TestApp::new(CatalogName::CarRental);
    app.server.get("/api/customers").await.assert_status_ok();

    let response = app.server.get("/metrics").await;

    response.assert_status_ok();
    assert!(response.text().contains("crud_backends_http_requests_total"));
}
