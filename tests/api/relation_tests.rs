//! Relation API Tests

use axum::http::StatusCode;
use crud_backends::config::CatalogName;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{ids, TestApp};

async fn room_with_reservations(app: &TestApp) -> String {
    let room = app
        .create("rooms", json!({ "roomNumber": 101, "isAvailable": true }))
        .await;
    for id in ["r1", "r2", "r3"] {
        app.create("reservations", json!({ "id": id })).await;
    }
    room
}

#[tokio::test]
async fn test_connect_is_idempotent_and_listed() {
    let app = TestApp::new(CatalogName::Reservation);
    let room = room_with_reservations(&app).await;
    let uri = format!("/api/rooms/{}/reservations", room);

    for _ in 0..2 {
        app.server
            .post(&uri)
            .json(&json!([{ "id": "r1" }, { "id": "r2" }]))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    let response = app.server.get(&uri).await;
    response.assert_status_ok();
    assert_eq!(ids(&response.json()), vec!["r1", "r2"]);

    let fetched = app.fetch("rooms", &room).await;
    assert_eq!(fetched["reservations"], json!(["r1", "r2"]));
}

#[tokio::test]
async fn test_disconnect_unlinks_children() {
    let app = TestApp::new(CatalogName::Reservation);
    let room = room_with_reservations(&app).await;
    let uri = format!("/api/rooms/{}/reservations", room);

    app.server
        .post(&uri)
        .json(&json!([{ "id": "r1" }, { "id": "r2" }]))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .delete(&uri)
        .json(&json!([{ "id": "r1" }]))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let fetched = app.fetch("reservations", "r1").await;
    assert_eq!(fetched["room"], Value::Null);
    assert_eq!(ids(&app.server.get(&uri).await.json()), vec!["r2"]);
}

#[tokio::test]
async fn test_update_children_replaces_the_set() {
    let app = TestApp::new(CatalogName::Reservation);
    let room = room_with_reservations(&app).await;
    let uri = format!("/api/rooms/{}/reservations", room);

    app.server
        .post(&uri)
        .json(&json!([{ "id": "r1" }, { "id": "r2" }]))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .patch(&uri)
        .json(&json!([{ "id": "r3" }]))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(ids(&app.server.get(&uri).await.json()), vec!["r3"]);
}

#[tokio::test]
async fn test_find_children_filters_and_sorts() {
    let app = TestApp::new(CatalogName::Reservation);
    let user = app.create("users", json!({ "username": "ada" })).await;
    for (id, rating) in [("v1", 3), ("v2", 5), ("v3", 4)] {
        app.create("reviews", json!({ "id": id, "rating": rating, "user": user }))
            .await;
    }
    app.create("reviews", json!({ "id": "other", "rating": 5 })).await;

    let response = app
        .server
        .get(&format!("/api/users/{}/reviews", user))
        .add_query_param("sortBy", "rating:desc")
        .add_query_param("take", "2")
        .await;

    response.assert_status_ok();
    assert_eq!(ids(&response.json()), vec!["v2", "v3"]);
}

#[tokio::test]
async fn test_relation_errors() {
    let app = TestApp::new(CatalogName::Reservation);
    let room = room_with_reservations(&app).await;

    // unknown parent
    app.server
        .get("/api/rooms/nope/reservations")
        .await
        .assert_status_not_found();

    // unknown relation
    app.server
        .get(&format!("/api/rooms/{}/guests", room))
        .await
        .assert_status_not_found();

    // no listed child exists
    app.server
        .post(&format!("/api/rooms/{}/reservations", room))
        .json(&json!([{ "id": "ghost" }]))
        .await
        .assert_status_not_found();

    // body must be a list of ids
    app.server
        .post(&format!("/api/rooms/{}/reservations", room))
        .json(&json!({ "id": "r1" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
