//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::{Settings, StorageBackend};
use crate::domain::record::RecordRepository;
use crate::domain::schema::Catalog;
use crate::infrastructure::database;
use crate::infrastructure::repositories::{MemoryRecordRepository, PgRecordRepository};
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{cors, logging};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn RecordRepository>,
    pub catalog: &'static Catalog,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(repository: Arc<dyn RecordRepository>, settings: Settings) -> Self {
        Self {
            repository,
            catalog: settings.backend.catalog.catalog(),
            settings: Arc::new(settings),
        }
    }
}

/// Build the router with its outer layers
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let catalog = settings.backend.catalog.catalog();

        let repository: Arc<dyn RecordRepository> = match settings.backend.storage {
            StorageBackend::Postgres => {
                let pool = database::create_pool(&settings.database).await?;
                tracing::info!("Database connection pool created");

                if settings.backend.run_migrations {
                    database::run_migrations(&pool, settings.backend.catalog).await?;
                    tracing::info!(catalog = catalog.name, "Migrations applied");
                }
                Arc::new(PgRecordRepository::new(pool))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on exit");
                Arc::new(MemoryRecordRepository::new(catalog))
            }
        };

        health::init_server_start();
        let addr = settings.server_addr();
        let state = AppState::new(repository, settings);
        tracing::info!(
            catalog = catalog.name,
            resources = catalog.resources.len(),
            "Catalog loaded"
        );

        let router = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
