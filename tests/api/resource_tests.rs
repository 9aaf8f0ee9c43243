//! Resource CRUD API Tests

use axum::http::{header, StatusCode};
use crud_backends::config::CatalogName;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{fake_customer, ids, TestApp};

#[tokio::test]
async fn test_create_returns_location_and_round_trips() {
    let app = TestApp::new(CatalogName::Crm);
    let body = fake_customer();

    let response = app.server.post("/api/customers").json(&body).await;

    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let id = created["id"].as_str().unwrap();
    assert_eq!(
        response.header(header::LOCATION),
        format!("/api/customers/{}", id).as_str()
    );

    let fetched = app.fetch("customers", id).await;
    assert_eq!(fetched["name"], body["name"]);
    assert_eq!(fetched["email"], body["email"]);
    assert_eq!(fetched["leads"], json!([]));
    assert!(fetched["createdAt"].is_string());
}

#[tokio::test]
async fn test_create_with_client_id_and_duplicate_conflicts() {
    let app = TestApp::new(CatalogName::Crm);
    app.create("customers", json!({ "id": "cu-1", "name": "Ada" }))
        .await;

    let response = app
        .server
        .post("/api/customers")
        .json(&json!({ "id": "cu-1", "name": "Other" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], 10005);
}

#[tokio::test]
async fn test_patch_updates_only_given_fields() {
    let app = TestApp::new(CatalogName::Crm);
    let id = app
        .create("customers", json!({ "name": "Ada", "phone": "555-0100" }))
        .await;

    app.server
        .patch(&format!("/api/customers/{}", id))
        .json(&json!({ "name": "Grace", "phone": null }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let fetched = app.fetch("customers", &id).await;
    assert_eq!(fetched["name"], "Grace");
    assert_eq!(fetched["phone"], Value::Null);
}

#[tokio::test]
async fn test_patch_with_mismatched_id_is_bad_request() {
    let app = TestApp::new(CatalogName::Crm);
    let id = app.create("customers", fake_customer()).await;

    app.server
        .patch(&format!("/api/customers/{}", id))
        .json(&json!({ "id": "someone-else" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let app = TestApp::new(CatalogName::Crm);

    let response = app.server.get("/api/customers/nope").await;
    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["code"], 10001);

    app.server
        .patch("/api/customers/nope")
        .json(&json!({ "name": "x" }))
        .await
        .assert_status_not_found();
    app.server
        .delete("/api/customers/nope")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let app = TestApp::new(CatalogName::Crm);
    let id = app.create("customers", fake_customer()).await;

    app.server
        .delete(&format!("/api/customers/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/customers/{}", id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_delete_clears_child_references() {
    let app = TestApp::new(CatalogName::Crm);
    let customer = app.create("customers", fake_customer()).await;
    let lead = app
        .create("leads", json!({ "name": "Lead", "customer": customer }))
        .await;

    app.server
        .delete(&format!("/api/customers/{}", customer))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let fetched = app.fetch("leads", &lead).await;
    assert_eq!(fetched["customer"], Value::Null);
}

#[tokio::test]
async fn test_unknown_belongs_to_target_is_not_found() {
    let app = TestApp::new(CatalogName::Crm);

    app.server
        .post("/api/leads")
        .json(&json!({ "name": "Lead", "customer": { "id": "ghost" } }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_filter_sort_and_paginate() {
    let app = TestApp::new(CatalogName::Crm);
    for (id, amount, stage) in [
        ("o1", 300.0, "Proposal"),
        ("o2", 100.0, "Proposal"),
        ("o3", 200.0, "Proposal"),
        ("o4", 50.0, "ClosedWon"),
    ] {
        app.create(
            "opportunities",
            json!({ "id": id, "amount": amount, "stage": stage }),
        )
        .await;
    }

    let response = app
        .server
        .get("/api/opportunities")
        .add_query_param("stage", "Proposal")
        .add_query_param("sortBy", "amount:desc")
        .add_query_param("skip", "1")
        .add_query_param("take", "2")
        .await;

    response.assert_status_ok();
    assert_eq!(ids(&response.json()), vec!["o3", "o2"]);
}

#[tokio::test]
async fn test_meta_counts_filtered_records() {
    let app = TestApp::new(CatalogName::Crm);
    for status in ["New", "New", "Lost"] {
        app.create("leads", json!({ "status": status })).await;
    }

    let response = app
        .server
        .post("/api/leads/meta")
        .add_query_param("status", "New")
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "count": 2 }));
}

#[tokio::test]
async fn test_invalid_input_is_bad_request() {
    let app = TestApp::new(CatalogName::Crm);
    let too_long = "x".repeat(1001);

    for body in [
        json!({ "name": too_long }),
        json!({ "amount": 1e12 }),
        json!({ "stage": "Won" }),
        json!({ "color": "red" }),
        json!({ "amount": "lots" }),
    ] {
        let response = app.server.post("/api/opportunities").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_malformed_query_is_bad_request() {
    let app = TestApp::new(CatalogName::Crm);

    for (key, value) in [
        ("take", "-1"),
        ("take", "9223372036854775808"),
        ("sortBy", "color"),
        ("color", "red"),
    ] {
        app.server
            .get("/api/opportunities")
            .add_query_param(key, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_secret_fields_are_never_returned() {
    let app = TestApp::new(CatalogName::CarRental);
    let id = app
        .create(
            "users",
            json!({ "username": "ada", "password": "correct horse battery" }),
        )
        .await;

    let fetched = app.fetch("users", &id).await;
    assert_eq!(fetched["username"], "ada");
    assert!(fetched.get("password").is_none());

    app.server
        .get("/api/users")
        .add_query_param("password", "correct horse battery")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_resource_is_not_found() {
    let app = TestApp::new(CatalogName::CarRental);

    app.server.get("/api/invoices").await.assert_status_not_found();
    app.server
        .post("/api/invoices")
        .json(&json!({}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_resource_path_is_case_insensitive() {
    let app = TestApp::new(CatalogName::CarRental);
    let id = app.create("orderItems", json!({ "quantity": 2 })).await;

    let fetched = app.fetch("orderitems", &id).await;
    assert_eq!(fetched["quantity"], 2);
}
