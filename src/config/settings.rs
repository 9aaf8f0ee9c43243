//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::catalogs::{CAR_RENTAL, CRM, RESERVATION};
use crate::domain::schema::Catalog;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Which catalog to serve and where to store it
    pub backend: BackendSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL, required by the postgres storage backend
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Catalog and storage selection.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub catalog: CatalogName,
    pub storage: StorageBackend,

    /// Apply the catalog's embedded migrations on startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogName {
    CarRental,
    Crm,
    Reservation,
}

impl CatalogName {
    pub fn catalog(self) -> &'static Catalog {
        match self {
            CatalogName::CarRental => &CAR_RENTAL,
            CatalogName::Crm => &CRM,
            CatalogName::Reservation => &RESERVATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Postgres,
    /// In-process tables, lost on exit
    Memory,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins
    pub allowed_origins: Vec<String>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the postgres backend is selected without a database URL.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("backend.catalog", "crm")?
            .set_default("backend.storage", "postgres")?
            .set_default("backend.run_migrations", true)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("backend.catalog", std::env::var("CATALOG").ok())?
            .set_override_option("backend.storage", std::env::var("STORAGE_BACKEND").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.backend.storage == StorageBackend::Postgres
            && self.database.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::Message(
                "database.url (DATABASE_URL) is required when backend.storage is postgres".into(),
            ));
        }
        Ok(self)
    }

    /// Settings for an in-memory server, used by tests and local demos.
    pub fn in_memory(catalog: CatalogName) -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".into(),
                port: 0,
            },
            database: DatabaseSettings {
                url: None,
                max_connections: 1,
                min_connections: 0,
                acquire_timeout: 5,
            },
            backend: BackendSettings {
                catalog,
                storage: StorageBackend::Memory,
                run_migrations: false,
            },
            cors: CorsSettings {
                allowed_origins: vec!["http://localhost:3000".into()],
            },
            environment: "test".into(),
        }
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_backend_requires_database_url() {
        let mut settings = Settings::in_memory(CatalogName::Crm);
        settings.backend.storage = StorageBackend::Postgres;
        assert!(settings.clone().validate().is_err());

        settings.database.url = Some("postgres://localhost/crm".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_catalog_names_deserialize_in_snake_case() {
        let name: CatalogName = serde_json::from_str("\"car_rental\"").unwrap();
        assert_eq!(name.catalog().name, "car_rental");
    }

    #[test]
    fn test_memory_backend_needs_no_database() {
        let settings = Settings::in_memory(CatalogName::Reservation);
        assert!(settings.validate().is_ok());
    }
}
