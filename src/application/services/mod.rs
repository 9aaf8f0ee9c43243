//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ResourceService**: create, read, update, delete and count records
//! - **RelationService**: connect, disconnect, list and replace has-many children

pub mod relation_service;
pub mod resource_service;

pub use relation_service::{RelationService, RelationServiceImpl};
pub use resource_service::{ResourceError, ResourceService, ResourceServiceImpl};
