//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

pub use request::{find_many_args, filter_from_query, RecordInput, WhereUniqueInput};
pub use response::{MetadataDto, ResourceDto};
