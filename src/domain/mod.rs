//! # Domain Layer
//!
//! Resource schemas, typed values, records and the repository contract.
//! Nothing here knows about HTTP or SQL.
//!
//! ## Structure
//!
//! - **schema**: static description of resources, fields and relations
//! - **catalogs**: the three business catalogs built from those schemas
//! - **value**: typed field values and their constraints
//! - **record**: stored rows and the `RecordRepository` trait
//! - **query**: filter, sort and pagination arguments

pub mod catalogs;
pub mod query;
pub mod record;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use query::{Filter, FindManyArgs, SortDirection, SortKey};
pub use record::{Record, RecordPatch, RecordRepository};
pub use schema::{Catalog, ChildLink, FieldKind, ResourceSchema};
pub use value::{FieldValue, ValueError};
