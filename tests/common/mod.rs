//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;

use axum_test::TestServer;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};

use crud_backends::config::{CatalogName, Settings};
use crud_backends::infrastructure::repositories::MemoryRecordRepository;
use crud_backends::startup::{build_router, AppState};

/// Test application over in-memory storage
pub struct TestApp {
    pub server: TestServer,
}

impl TestApp {
    /// Serve the given catalog from a fresh in-memory store
    pub fn new(catalog: CatalogName) -> Self {
        let settings = Settings::in_memory(catalog);
        let repository = Arc::new(MemoryRecordRepository::new(catalog.catalog()));
        let state = AppState::new(repository, settings);

        let server = TestServer::new(build_router(state)).expect("test server");
        Self { server }
    }

    /// Create a record and return its id
    pub async fn create(&self, path: &str, body: Value) -> String {
        let response = self.server.post(&format!("/api/{}", path)).json(&body).await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let created: Value = response.json();
        created["id"].as_str().expect("id in response").to_string()
    }

    /// Fetch a record as JSON
    pub async fn fetch(&self, path: &str, id: &str) -> Value {
        self.server
            .get(&format!("/api/{}/{}", path, id))
            .await
            .json()
    }
}

/// A CRM customer with fake contact details
pub fn fake_customer() -> Value {
    let name: String = Name().fake();
    let email: String = SafeEmail().fake();
    json!({ "name": name, "email": email })
}

/// Ids of a JSON list of records, in order
pub fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
