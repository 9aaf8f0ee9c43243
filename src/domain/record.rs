//! Records and the repository trait.
//!
//! A [`Record`] is one row of any resource: the built-in columns plus the
//! values of the schema's fields and belongs-to foreign keys, keyed by
//! their JSON names.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use super::query::{Filter, FindManyArgs};
use super::schema::{ChildLink, ResourceSchema};
use super::value::FieldValue;
use crate::shared::error::AppError;

/// Values of a record keyed by field or belongs-to relation name.
pub type Values = BTreeMap<&'static str, FieldValue>;

/// One stored row of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub values: Values,
}

impl Record {
    /// Read a column by name, including the built-in ones.
    ///
    /// Columns the record does not carry read as `Null`.
    pub fn get(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Text(self.id.clone()),
            "createdAt" => FieldValue::Timestamp(self.created_at),
            "updatedAt" => FieldValue::Timestamp(self.updated_at),
            _ => self.values.get(name).cloned().unwrap_or(FieldValue::Null),
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &RecordPatch) {
        for (name, value) in &patch.values {
            self.values.insert(*name, value.clone());
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        self.updated_at = patch.updated_at;
    }
}

/// Changes written by an update. Only the listed values are touched.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    pub values: Values,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Current time at the precision the database keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Repository trait over every resource of a catalog.
///
/// Implementations map [`ResourceSchema`] descriptions onto storage; they do
/// not check existence of referenced rows, which is the service's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    /// Insert a new record and point the listed children at it, in one
    /// atomic write. A duplicate id yields `AppError::Conflict`.
    async fn insert(
        &self,
        schema: &'static ResourceSchema,
        record: Record,
        children: &[(ChildLink, Vec<String>)],
    ) -> Result<Record, AppError>;

    /// Find a record by id.
    async fn find_by_id(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
    ) -> Result<Option<Record>, AppError>;

    /// Find records matching the filter, sorted then paginated.
    async fn find_many(
        &self,
        schema: &'static ResourceSchema,
        args: &FindManyArgs,
    ) -> Result<Vec<Record>, AppError>;

    /// Count records matching the filter.
    async fn count(&self, schema: &'static ResourceSchema, filter: &Filter)
        -> Result<u64, AppError>;

    /// Apply a partial update and make each listed child set exactly the
    /// record's children, in one atomic write. Returns `None` when no row
    /// was written, in which case nothing changed.
    async fn update(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
        patch: &RecordPatch,
        children: &[(ChildLink, Vec<String>)],
    ) -> Result<Option<Record>, AppError>;

    /// Delete a record, clearing foreign keys that point at it.
    /// Returns whether a row was removed.
    async fn delete(&self, schema: &'static ResourceSchema, id: &str) -> Result<bool, AppError>;

    /// The subset of `ids` that exist.
    async fn existing_ids(
        &self,
        schema: &'static ResourceSchema,
        ids: &[String],
    ) -> Result<Vec<String>, AppError>;

    /// Child ids per parent id, ordered by child id.
    async fn linked_ids(
        &self,
        link: ChildLink,
        parent_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, AppError>;

    /// Point the given children at `parent_id`. Returns rows changed.
    async fn link(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<u64, AppError>;

    /// Clear the foreign key of the given children that currently point at
    /// `parent_id`. Returns rows changed.
    async fn unlink(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<u64, AppError>;

    /// Make `child_ids` exactly the children of `parent_id`, atomically.
    async fn replace_links(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<(), AppError>;
}
