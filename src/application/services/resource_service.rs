//! Resource Service
//!
//! Create, read, update and delete for any resource of the served catalog,
//! plus the filtered count behind the `meta` endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use uuid::Uuid;

use crate::application::dto::{MetadataDto, RecordInput, ResourceDto};
use crate::domain::query::{Filter, FindManyArgs};
use crate::domain::record::{now, Record, RecordPatch, RecordRepository, Values};
use crate::domain::schema::{Catalog, ChildLink, FieldKind, ResourceSchema};
use crate::domain::value::FieldValue;
use crate::shared::error::AppError;

/// Resource service trait.
#[async_trait]
pub trait ResourceService: Send + Sync {
    /// Create a record and connect the listed has-many children.
    async fn create(
        &self,
        schema: &'static ResourceSchema,
        input: RecordInput,
    ) -> Result<ResourceDto, ResourceError>;

    /// Delete a record by id.
    async fn delete(&self, schema: &'static ResourceSchema, id: &str) -> Result<(), ResourceError>;

    /// List records matching the arguments.
    async fn find_many(
        &self,
        schema: &'static ResourceSchema,
        args: FindManyArgs,
    ) -> Result<Vec<ResourceDto>, ResourceError>;

    /// Count records matching the filter.
    async fn meta(
        &self,
        schema: &'static ResourceSchema,
        filter: Filter,
    ) -> Result<MetadataDto, ResourceError>;

    /// Get one record by id.
    async fn find_one(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
    ) -> Result<ResourceDto, ResourceError>;

    /// Write the fields present in the input.
    async fn update(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
        input: RecordInput,
    ) -> Result<(), ResourceError>;
}

// =============================================================================
// Error Types
// =============================================================================

/// Resource and relation service errors.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for ResourceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => ResourceError::NotFound(msg),
            AppError::BadRequest(msg) => ResourceError::BadRequest(msg),
            AppError::Validation(msg) => ResourceError::Validation(msg),
            AppError::Conflict(msg) => ResourceError::Conflict(msg),
            AppError::Internal(msg) => ResourceError::Internal(msg),
            AppError::Database(e) => ResourceError::Internal(e.to_string()),
        }
    }
}

// =============================================================================
// Service Implementation
// =============================================================================

/// ResourceService implementation over any record repository.
pub struct ResourceServiceImpl<R>
where
    R: RecordRepository + ?Sized,
{
    repo: Arc<R>,
    catalog: &'static Catalog,
}

impl<R> ResourceServiceImpl<R>
where
    R: RecordRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, catalog: &'static Catalog) -> Self {
        Self { repo, catalog }
    }

    /// Ensure every belongs-to id in `values` points at an existing record.
    async fn check_references(
        &self,
        schema: &'static ResourceSchema,
        values: &Values,
    ) -> Result<(), ResourceError> {
        for relation in schema.belongs_to() {
            let Some(id) = values.get(relation.name).and_then(FieldValue::as_text) else {
                continue;
            };
            let target = self
                .catalog
                .resource(relation.target)
                .ok_or_else(|| ResourceError::Internal(format!("unknown {}", relation.target)))?;
            let found = self
                .repo
                .existing_ids(target, &[id.to_string()])
                .await?;
            if found.is_empty() {
                return Err(ResourceError::NotFound(format!("{} {} not found", target.name, id)));
            }
        }
        Ok(())
    }

    /// Existing child ids for each has-many list of the input.
    async fn resolve_children(
        &self,
        input: &RecordInput,
    ) -> Result<Vec<(ChildLink, Vec<String>)>, ResourceError> {
        let mut resolved = Vec::with_capacity(input.children.len());
        for (relation, ids) in &input.children {
            let link = self.catalog.child_link(relation).ok_or_else(|| {
                ResourceError::Internal(format!("relation {} has no inverse", relation.name))
            })?;
            let existing = self.repo.existing_ids(link.child, ids).await?;
            resolved.push((link, existing));
        }
        Ok(resolved)
    }

    async fn to_dto(
        &self,
        schema: &'static ResourceSchema,
        record: Record,
    ) -> Result<ResourceDto, ResourceError> {
        let mut dtos = build_dtos(self.repo.as_ref(), self.catalog, schema, vec![record]).await?;
        dtos.pop()
            .ok_or_else(|| ResourceError::Internal("record vanished while shaping".into()))
    }
}

/// Shape records as DTOs, loading the child ids of every has-many relation
/// with one query per relation.
pub(crate) async fn build_dtos<R>(
    repo: &R,
    catalog: &'static Catalog,
    schema: &'static ResourceSchema,
    records: Vec<Record>,
) -> Result<Vec<ResourceDto>, AppError>
where
    R: RecordRepository + ?Sized,
{
    let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

    let mut per_relation = Vec::new();
    for relation in schema.has_many() {
        let Some(link) = catalog.child_link(relation) else {
            continue;
        };
        let linked = if ids.is_empty() {
            HashMap::new()
        } else {
            repo.linked_ids(link, &ids).await?
        };
        per_relation.push((relation.name, linked));
    }

    Ok(records
        .iter()
        .map(|record| {
            let children: HashMap<&'static str, Vec<String>> = per_relation
                .iter()
                .map(|(name, linked)| (*name, linked.get(&record.id).cloned().unwrap_or_default()))
                .collect();
            ResourceDto::from_record(schema, record, &children)
        })
        .collect())
}

/// Replace plaintext secret values with Argon2 hashes.
pub(crate) fn hash_secrets(
    schema: &'static ResourceSchema,
    values: &mut Values,
) -> Result<(), ResourceError> {
    for field in schema
        .fields
        .iter()
        .filter(|f| matches!(f.kind, FieldKind::Secret { .. }))
    {
        if let Some(FieldValue::Text(plain)) = values.get(field.name) {
            let salt = SaltString::generate(&mut OsRng);
            let hash = Argon2::default()
                .hash_password(plain.as_bytes(), &salt)
                .map_err(|e| ResourceError::Internal(format!("hashing failed: {}", e)))?
                .to_string();
            values.insert(field.name, FieldValue::Text(hash));
        }
    }
    Ok(())
}

#[async_trait]
impl<R> ResourceService for ResourceServiceImpl<R>
where
    R: RecordRepository + ?Sized,
{
    async fn create(
        &self,
        schema: &'static ResourceSchema,
        input: RecordInput,
    ) -> Result<ResourceDto, ResourceError> {
        self.check_references(schema, &input.values).await?;
        let children = self.resolve_children(&input).await?;

        let at = now();
        let mut values = input.values;
        hash_secrets(schema, &mut values)?;

        let record = Record {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            created_at: input.created_at.unwrap_or(at),
            updated_at: input.updated_at.unwrap_or(at),
            values,
        };

        let record = self.repo.insert(schema, record, &children).await?;

        tracing::debug!(resource = schema.name, id = %record.id, "Record created");
        self.to_dto(schema, record).await
    }

    async fn delete(&self, schema: &'static ResourceSchema, id: &str) -> Result<(), ResourceError> {
        if !self.repo.delete(schema, id).await? {
            return Err(ResourceError::NotFound(format!("{} {} not found", schema.name, id)));
        }

        tracing::debug!(resource = schema.name, id, "Record deleted");
        Ok(())
    }

    async fn find_many(
        &self,
        schema: &'static ResourceSchema,
        args: FindManyArgs,
    ) -> Result<Vec<ResourceDto>, ResourceError> {
        let records = self.repo.find_many(schema, &args).await?;
        Ok(build_dtos(self.repo.as_ref(), self.catalog, schema, records).await?)
    }

    async fn meta(
        &self,
        schema: &'static ResourceSchema,
        filter: Filter,
    ) -> Result<MetadataDto, ResourceError> {
        let count = self.repo.count(schema, &filter).await?;
        Ok(MetadataDto { count })
    }

    async fn find_one(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
    ) -> Result<ResourceDto, ResourceError> {
        let record = self
            .repo
            .find_by_id(schema, id)
            .await?
            .ok_or_else(|| ResourceError::NotFound(format!("{} {} not found", schema.name, id)))?;
        self.to_dto(schema, record).await
    }

    async fn update(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
        input: RecordInput,
    ) -> Result<(), ResourceError> {
        if input.id.as_deref().is_some_and(|body_id| body_id != id) {
            return Err(ResourceError::BadRequest(
                "Body id does not match the id in the path".into(),
            ));
        }

        if self.repo.find_by_id(schema, id).await?.is_none() {
            return Err(ResourceError::NotFound(format!("{} {} not found", schema.name, id)));
        }
        self.check_references(schema, &input.values).await?;
        let children = self.resolve_children(&input).await?;

        let mut values = input.values;
        hash_secrets(schema, &mut values)?;
        let patch = RecordPatch {
            values,
            created_at: input.created_at,
            updated_at: input.updated_at.unwrap_or_else(now),
        };

        if self.repo.update(schema, id, &patch, &children).await?.is_none() {
            // Nothing written: either the row is gone or it changed under us.
            return match self.repo.find_by_id(schema, id).await? {
                None => Err(ResourceError::NotFound(format!("{} {} not found", schema.name, id))),
                Some(_) => Err(ResourceError::Conflict(format!(
                    "{} {} was modified concurrently",
                    schema.name, id
                ))),
            };
        }

        tracing::debug!(resource = schema.name, id, "Record updated");
        Ok(())
    }
}
