//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::compression::CompressionLayer;

use super::handlers::{health, relation, resource};
use crate::infrastructure::metrics;
use crate::presentation::middleware::track_metrics;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_metrics))
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Generic resource routes, served for every resource of the catalog
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{resource}",
            get(resource::find_many).post(resource::create),
        )
        .route("/{resource}/meta", post(resource::meta))
        .route(
            "/{resource}/{id}",
            get(resource::find_one)
                .patch(resource::update)
                .delete(resource::delete),
        )
        .route(
            "/{resource}/{id}/{relation}",
            get(relation::find_children)
                .post(relation::connect)
                .patch(relation::update_children)
                .delete(relation::disconnect),
        )
}
