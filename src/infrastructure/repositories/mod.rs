//! Repository Implementations
//!
//! Implementations of the domain `RecordRepository` trait.
//!
//! - **PgRecordRepository** - PostgreSQL tables created by the catalog migrations
//! - **MemoryRecordRepository** - in-process tables for tests and demos

pub mod memory_record_repository;
pub mod pg_record_repository;

pub use memory_record_repository::MemoryRecordRepository;
pub use pg_record_repository::PgRecordRepository;
