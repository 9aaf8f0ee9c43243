//! Database Module
//!
//! PostgreSQL connection pool and the embedded schema migrations, one set
//! per catalog.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::{CatalogName, DatabaseSettings};
use crate::shared::error::AppError;

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, AppError> {
    let url = settings
        .url
        .as_deref()
        .ok_or_else(|| AppError::Internal("database.url is not configured".into()))?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(url)
        .await?;
    Ok(pool)
}

/// Run the migrations of the given catalog
pub async fn run_migrations(
    pool: &PgPool,
    catalog: CatalogName,
) -> Result<(), sqlx::migrate::MigrateError> {
    match catalog {
        CatalogName::CarRental => sqlx::migrate!("./migrations/car_rental").run(pool).await,
        CatalogName::Crm => sqlx::migrate!("./migrations/crm").run(pool).await,
        CatalogName::Reservation => sqlx::migrate!("./migrations/reservation").run(pool).await,
    }
}
