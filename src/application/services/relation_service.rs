//! Relation Service
//!
//! Connect, disconnect, list and replace the children of a has-many
//! relation. Linking a child means pointing its foreign key at the parent.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::resource_service::{build_dtos, ResourceError};
use crate::application::dto::{ResourceDto, WhereUniqueInput};
use crate::domain::query::FindManyArgs;
use crate::domain::record::RecordRepository;
use crate::domain::schema::{Catalog, ChildLink, ResourceSchema};
use crate::domain::value::FieldValue;
use crate::shared::validation::validate_all;

/// Relation service trait.
#[async_trait]
pub trait RelationService: Send + Sync {
    /// Link the listed children to the parent.
    async fn connect(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        children: Vec<WhereUniqueInput>,
    ) -> Result<(), ResourceError>;

    /// Unlink the listed children that currently belong to the parent.
    async fn disconnect(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        children: Vec<WhereUniqueInput>,
    ) -> Result<(), ResourceError>;

    /// List the parent's children.
    async fn find_children(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        args: FindManyArgs,
    ) -> Result<Vec<ResourceDto>, ResourceError>;

    /// Make the listed children exactly the parent's children.
    async fn update_children(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        children: Vec<WhereUniqueInput>,
    ) -> Result<(), ResourceError>;
}

/// RelationService implementation over any record repository.
pub struct RelationServiceImpl<R>
where
    R: RecordRepository + ?Sized,
{
    repo: Arc<R>,
    catalog: &'static Catalog,
}

impl<R> RelationServiceImpl<R>
where
    R: RecordRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, catalog: &'static Catalog) -> Self {
        Self { repo, catalog }
    }

    /// Resolve the relation and check the parent exists.
    async fn prepare(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
    ) -> Result<ChildLink, ResourceError> {
        let link = schema
            .relation(relation)
            .and_then(|r| self.catalog.child_link(r))
            .ok_or_else(|| {
                ResourceError::NotFound(format!(
                    "{} has no relation named {}",
                    schema.name, relation
                ))
            })?;

        if self.repo.find_by_id(schema, parent_id).await?.is_none() {
            return Err(ResourceError::NotFound(format!(
                "{} {} not found",
                schema.name, parent_id
            )));
        }
        Ok(link)
    }

    /// Validated ids of the request body, of which at least one must exist.
    async fn existing_children(
        &self,
        link: ChildLink,
        children: &[WhereUniqueInput],
    ) -> Result<Vec<String>, ResourceError> {
        validate_all(children)?;
        let ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();

        let existing = self.repo.existing_ids(link.child, &ids).await?;
        if existing.is_empty() {
            return Err(ResourceError::NotFound(format!(
                "No matching {} records found",
                link.child.name
            )));
        }
        Ok(existing)
    }
}

#[async_trait]
impl<R> RelationService for RelationServiceImpl<R>
where
    R: RecordRepository + ?Sized,
{
    async fn connect(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        children: Vec<WhereUniqueInput>,
    ) -> Result<(), ResourceError> {
        let link = self.prepare(schema, parent_id, relation).await?;
        let existing = self.existing_children(link, &children).await?;

        let linked: HashSet<String> = self
            .repo
            .linked_ids(link, &[parent_id.to_string()])
            .await?
            .remove(parent_id)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let to_link: Vec<String> = existing
            .into_iter()
            .filter(|id| !linked.contains(id))
            .collect();

        let changed = self.repo.link(link, parent_id, &to_link).await?;
        tracing::debug!(
            resource = schema.name,
            parent_id,
            relation = link.relation.name,
            changed,
            "Children connected"
        );
        Ok(())
    }

    async fn disconnect(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        children: Vec<WhereUniqueInput>,
    ) -> Result<(), ResourceError> {
        let link = self.prepare(schema, parent_id, relation).await?;
        validate_all(&children)?;
        let ids: Vec<String> = children.into_iter().map(|c| c.id).collect();

        let changed = self.repo.unlink(link, parent_id, &ids).await?;
        tracing::debug!(
            resource = schema.name,
            parent_id,
            relation = link.relation.name,
            changed,
            "Children disconnected"
        );
        Ok(())
    }

    async fn find_children(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        mut args: FindManyArgs,
    ) -> Result<Vec<ResourceDto>, ResourceError> {
        let link = self.prepare(schema, parent_id, relation).await?;

        args.filter = args
            .filter
            .and(link.as_column(), FieldValue::Text(parent_id.to_string()));
        let records = self.repo.find_many(link.child, &args).await?;

        Ok(build_dtos(self.repo.as_ref(), self.catalog, link.child, records).await?)
    }

    async fn update_children(
        &self,
        schema: &'static ResourceSchema,
        parent_id: &str,
        relation: &str,
        children: Vec<WhereUniqueInput>,
    ) -> Result<(), ResourceError> {
        let link = self.prepare(schema, parent_id, relation).await?;
        let existing = self.existing_children(link, &children).await?;

        self.repo.replace_links(link, parent_id, &existing).await?;
        tracing::debug!(
            resource = schema.name,
            parent_id,
            relation = link.relation.name,
            count = existing.len(),
            "Children replaced"
        );
        Ok(())
    }
}
