//! # CRUD Backends
//!
//! Serves one catalog of REST resources (car rental, CRM or reservation
//! management) over PostgreSQL or in-memory storage.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Record store (database pool and migrations, or in-memory tables)
//! - HTTP server

use anyhow::Result;
use tracing::info;

use crud_backends::config::Settings;
use crud_backends::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    crud_backends::telemetry::init_tracing();

    info!("Starting CRUD backend...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        catalog = ?settings.backend.catalog,
        storage = ?settings.backend.storage,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
