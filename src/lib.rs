//! # CRUD Backends Library
//!
//! Catalog-driven REST backends for three business domains: car rental,
//! CRM and reservation management. Every entity is described once as a
//! static resource schema and served by one generic engine:
//! - CRUD endpoints with filtering, sorting and pagination
//! - Has-many relation endpoints (connect, disconnect, list, replace)
//! - PostgreSQL storage with per-catalog migrations, or in-memory tables
//!
//! ## Architecture
//!
//! - **Domain Layer**: Resource schemas, catalogs, values and the repository trait
//! - **Application Layer**: Resource and relation services, request/response DTOs
//! - **Infrastructure Layer**: PostgreSQL and in-memory repositories, metrics
//! - **Presentation Layer**: HTTP routes, handlers and middleware
//!
//! ## Module Structure
//!
//! ```text
//! crud_backends/
//! +-- config/         Configuration management
//! +-- domain/         Schemas, catalogs, records and queries
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Database, repositories and metrics
//! +-- presentation/   HTTP routes, handlers and middleware
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
