//! In-memory Record Repository
//!
//! Keeps every table of a catalog in process behind one lock. Used by the
//! `memory` storage backend and by the integration tests.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::query::{Filter, FindManyArgs};
use crate::domain::record::{Record, RecordPatch, RecordRepository};
use crate::domain::schema::{Catalog, ChildLink, ResourceSchema};
use crate::domain::value::FieldValue;
use crate::infrastructure::metrics::record_db_query;
use crate::shared::error::AppError;

type Table = BTreeMap<String, Record>;

/// Record repository over in-process tables.
pub struct MemoryRecordRepository {
    catalog: &'static Catalog,
    tables: RwLock<HashMap<&'static str, Table>>,
}

impl MemoryRecordRepository {
    pub fn new(catalog: &'static Catalog) -> Self {
        let tables = catalog
            .resources
            .iter()
            .map(|r| (r.table, Table::new()))
            .collect();
        Self {
            catalog,
            tables: RwLock::new(tables),
        }
    }

    /// Reject belongs-to values that point at missing rows, as the
    /// foreign keys of the SQL schema would.
    fn check_references<'a>(
        &self,
        tables: &HashMap<&'static str, Table>,
        schema: &'static ResourceSchema,
        values: impl Iterator<Item = (&'a str, &'a FieldValue)>,
    ) -> Result<(), AppError> {
        for (name, value) in values {
            let Some(parent_id) = value.as_text() else {
                continue;
            };
            let Some(relation) = schema.belongs_to().find(|r| r.name == name) else {
                continue;
            };
            let exists = self
                .catalog
                .resource(relation.target)
                .and_then(|target| tables.get(target.table))
                .is_some_and(|t| t.contains_key(parent_id));
            if !exists {
                return Err(AppError::NotFound(format!(
                    "Referenced record of {} not found",
                    schema.name
                )));
            }
        }
        Ok(())
    }
}

fn observe(operation: &str, table: &str, started: Instant) {
    record_db_query(operation, table, started.elapsed().as_secs_f64());
}

fn points_at(record: &Record, link: &ChildLink, parent_id: &str) -> bool {
    record.get(link.relation.name).as_text() == Some(parent_id)
}

fn set_parent(record: &mut Record, link: &ChildLink, parent: FieldValue) {
    record.values.insert(link.relation.name, parent);
}

/// Point the listed children at `parent_id`. Returns rows changed.
fn link_children(
    tables: &mut HashMap<&'static str, Table>,
    link: &ChildLink,
    parent_id: &str,
    child_ids: &[String],
) -> u64 {
    let mut changed = 0;
    if let Some(children) = tables.get_mut(link.child.table) {
        for id in child_ids {
            if let Some(child) = children.get_mut(id) {
                if !points_at(child, link, parent_id) {
                    set_parent(child, link, FieldValue::Text(parent_id.to_string()));
                    changed += 1;
                }
            }
        }
    }
    changed
}

/// Make `child_ids` exactly the children of `parent_id`.
fn replace_children(
    tables: &mut HashMap<&'static str, Table>,
    link: &ChildLink,
    parent_id: &str,
    child_ids: &[String],
) {
    if let Some(children) = tables.get_mut(link.child.table) {
        for child in children.values_mut() {
            if child_ids.iter().any(|id| *id == child.id) {
                set_parent(child, link, FieldValue::Text(parent_id.to_string()));
            } else if points_at(child, link, parent_id) {
                set_parent(child, link, FieldValue::Null);
            }
        }
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert(
        &self,
        schema: &'static ResourceSchema,
        record: Record,
        children: &[(ChildLink, Vec<String>)],
    ) -> Result<Record, AppError> {
        let started = Instant::now();
        let mut tables = self.tables.write();

        self.check_references(
            &tables,
            schema,
            record.values.iter().map(|(k, v)| (*k, v)),
        )?;

        let table = tables.entry(schema.table).or_default();
        if table.contains_key(&record.id) {
            return Err(AppError::Conflict(format!(
                "{} with this id already exists",
                schema.name
            )));
        }

        // Store every column so reads look the same as SQL rows.
        let mut stored = record;
        for column in schema.stored_columns() {
            stored.values.entry(column.name).or_insert(FieldValue::Null);
        }
        table.insert(stored.id.clone(), stored.clone());
        for (link, ids) in children {
            link_children(&mut tables, link, &stored.id, ids);
        }
        observe("insert", schema.table, started);

        Ok(stored)
    }

    async fn find_by_id(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
    ) -> Result<Option<Record>, AppError> {
        let started = Instant::now();
        let tables = self.tables.read();
        let record = tables.get(schema.table).and_then(|t| t.get(id)).cloned();
        observe("find_by_id", schema.table, started);
        Ok(record)
    }

    async fn find_many(
        &self,
        schema: &'static ResourceSchema,
        args: &FindManyArgs,
    ) -> Result<Vec<Record>, AppError> {
        let started = Instant::now();
        let tables = self.tables.read();
        let records = tables
            .get(schema.table)
            .map(|t| args.apply(t.values().cloned()))
            .unwrap_or_default();
        observe("find_many", schema.table, started);
        Ok(records)
    }

    async fn count(
        &self,
        schema: &'static ResourceSchema,
        filter: &Filter,
    ) -> Result<u64, AppError> {
        let started = Instant::now();
        let tables = self.tables.read();
        let count = tables
            .get(schema.table)
            .map(|t| t.values().filter(|r| filter.matches(r)).count())
            .unwrap_or(0);
        observe("count", schema.table, started);
        Ok(count as u64)
    }

    async fn update(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
        patch: &RecordPatch,
        children: &[(ChildLink, Vec<String>)],
    ) -> Result<Option<Record>, AppError> {
        let started = Instant::now();
        let mut tables = self.tables.write();

        self.check_references(&tables, schema, patch.values.iter().map(|(k, v)| (*k, v)))?;

        let updated = tables
            .get_mut(schema.table)
            .and_then(|t| t.get_mut(id))
            .map(|record| {
                record.apply(patch);
                record.clone()
            });
        if updated.is_some() {
            for (link, ids) in children {
                replace_children(&mut tables, link, id, ids);
            }
        }
        observe("update", schema.table, started);

        Ok(updated)
    }

    async fn delete(&self, schema: &'static ResourceSchema, id: &str) -> Result<bool, AppError> {
        let started = Instant::now();
        let mut tables = self.tables.write();

        let removed = tables
            .get_mut(schema.table)
            .and_then(|t| t.remove(id))
            .is_some();

        if removed {
            for link in self.catalog.referencing(schema.name) {
                if let Some(children) = tables.get_mut(link.child.table) {
                    children
                        .values_mut()
                        .filter(|r| points_at(r, &link, id))
                        .for_each(|r| set_parent(r, &link, FieldValue::Null));
                }
            }
        }
        observe("delete", schema.table, started);

        Ok(removed)
    }

    async fn existing_ids(
        &self,
        schema: &'static ResourceSchema,
        ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        let started = Instant::now();
        let tables = self.tables.read();
        let Some(table) = tables.get(schema.table) else {
            return Ok(Vec::new());
        };

        let mut existing: Vec<String> = ids
            .iter()
            .filter(|id| table.contains_key(id.as_str()))
            .cloned()
            .collect();
        existing.sort();
        existing.dedup();
        observe("existing_ids", schema.table, started);
        Ok(existing)
    }

    async fn linked_ids(
        &self,
        link: ChildLink,
        parent_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, AppError> {
        let started = Instant::now();
        let tables = self.tables.read();
        let mut linked: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(children) = tables.get(link.child.table) {
            // BTreeMap iteration keeps child ids ordered.
            for child in children.values() {
                if let Some(parent) = child.get(link.relation.name).as_text() {
                    if parent_ids.iter().any(|p| p == parent) {
                        linked
                            .entry(parent.to_string())
                            .or_default()
                            .push(child.id.clone());
                    }
                }
            }
        }
        observe("linked_ids", link.child.table, started);
        Ok(linked)
    }

    async fn link(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<u64, AppError> {
        let started = Instant::now();
        let mut tables = self.tables.write();
        let changed = link_children(&mut tables, &link, parent_id, child_ids);
        observe("link", link.child.table, started);

        Ok(changed)
    }

    async fn unlink(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<u64, AppError> {
        let started = Instant::now();
        let mut tables = self.tables.write();
        let mut changed = 0;

        if let Some(children) = tables.get_mut(link.child.table) {
            for id in child_ids {
                if let Some(child) = children.get_mut(id) {
                    if points_at(child, &link, parent_id) {
                        set_parent(child, &link, FieldValue::Null);
                        changed += 1;
                    }
                }
            }
        }
        observe("unlink", link.child.table, started);

        Ok(changed)
    }

    async fn replace_links(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<(), AppError> {
        let started = Instant::now();
        let mut tables = self.tables.write();
        replace_children(&mut tables, &link, parent_id, child_ids);
        observe("replace_links", link.child.table, started);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalogs::CRM;
    use crate::domain::record::{now, RecordPatch, Values};
    use crate::infrastructure::metrics::gather_metrics;
    use pretty_assertions::assert_eq;

    fn schema(name: &str) -> &'static ResourceSchema {
        CRM.resource(name).unwrap()
    }

    fn record(id: &str, values: Values) -> Record {
        let at = now();
        Record {
            id: id.to_string(),
            created_at: at,
            updated_at: at,
            values,
        }
    }

    fn contacts_link() -> ChildLink {
        let customers = schema("Customer");
        CRM.child_link(customers.relation("contacts").unwrap()).unwrap()
    }

    async fn seeded() -> MemoryRecordRepository {
        let repo = MemoryRecordRepository::new(&CRM);
        repo.insert(schema("Customer"), record("cu1", Values::new()), &[])
            .await
            .unwrap();
        for id in ["c1", "c2", "c3"] {
            repo.insert(schema("Contact"), record(id, Values::new()), &[])
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_insert_fills_missing_columns_with_null() {
        let repo = MemoryRecordRepository::new(&CRM);
        let stored = repo
            .insert(
                schema("Customer"),
                record("a", Values::from([("name", FieldValue::Text("Ann".into()))])),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(stored.values.get("phone"), Some(&FieldValue::Null));
        assert_eq!(stored.get("name"), FieldValue::Text("Ann".into()));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_a_conflict() {
        let repo = seeded().await;
        let err = repo
            .insert(schema("Customer"), record("cu1", Values::new()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dangling_reference_is_not_found() {
        let repo = seeded().await;
        let err = repo
            .insert(
                schema("Contact"),
                record(
                    "c9",
                    Values::from([("customer", FieldValue::Text("ghost".into()))]),
                ),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_link_skips_children_already_linked() {
        let repo = seeded().await;
        let link = contacts_link();
        let ids = vec!["c1".to_string(), "c2".to_string()];

        assert_eq!(repo.link(link, "cu1", &ids).await.unwrap(), 2);
        assert_eq!(repo.link(link, "cu1", &ids).await.unwrap(), 0);

        let linked = repo.linked_ids(link, &["cu1".to_string()]).await.unwrap();
        assert_eq!(linked["cu1"], vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_replace_links_detaches_others() {
        let repo = seeded().await;
        let link = contacts_link();
        repo.link(link, "cu1", &["c1".to_string(), "c2".to_string()])
            .await
            .unwrap();

        repo.replace_links(link, "cu1", &["c3".to_string()]).await.unwrap();

        let linked = repo.linked_ids(link, &["cu1".to_string()]).await.unwrap();
        assert_eq!(linked["cu1"], vec!["c3"]);
        let c1 = repo.find_by_id(schema("Contact"), "c1").await.unwrap().unwrap();
        assert_eq!(c1.get("customer"), FieldValue::Null);
    }

    #[tokio::test]
    async fn test_delete_clears_child_foreign_keys() {
        let repo = seeded().await;
        let link = contacts_link();
        repo.link(link, "cu1", &["c1".to_string()]).await.unwrap();

        assert!(repo.delete(schema("Customer"), "cu1").await.unwrap());
        assert!(!repo.delete(schema("Customer"), "cu1").await.unwrap());

        let c1 = repo.find_by_id(schema("Contact"), "c1").await.unwrap().unwrap();
        assert_eq!(c1.get("customer"), FieldValue::Null);
    }

    #[tokio::test]
    async fn test_existing_ids_ignores_unknown() {
        let repo = seeded().await;
        let existing = repo
            .existing_ids(
                schema("Contact"),
                &["c2".to_string(), "nope".to_string(), "c1".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(existing, vec!["c1", "c2"]);
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_links_children_with_the_record() {
        let repo = seeded().await;
        let link = contacts_link();

        repo.insert(
            schema("Customer"),
            record("cu2", Values::new()),
            &[(link, ids(&["c1", "c2"]))],
        )
        .await
        .unwrap();

        let linked = repo.linked_ids(link, &ids(&["cu2"])).await.unwrap();
        assert_eq!(linked["cu2"], vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_rejected_insert_leaves_children_untouched() {
        let repo = seeded().await;
        let link = contacts_link();
        repo.link(link, "cu1", &ids(&["c1"])).await.unwrap();

        let err = repo
            .insert(
                schema("Customer"),
                record("cu1", Values::new()),
                &[(link, ids(&["c2"]))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let c2 = repo.find_by_id(schema("Contact"), "c2").await.unwrap().unwrap();
        assert_eq!(c2.get("customer"), FieldValue::Null);
    }

    #[tokio::test]
    async fn test_update_replaces_children_with_the_patch() {
        let repo = seeded().await;
        let link = contacts_link();
        repo.link(link, "cu1", &ids(&["c1"])).await.unwrap();

        let patch = RecordPatch {
            values: Values::from([("name", FieldValue::Text("Acme".into()))]),
            created_at: None,
            updated_at: now(),
        };
        let updated = repo
            .update(schema("Customer"), "cu1", &patch, &[(link, ids(&["c3"]))])
            .await
            .unwrap();
        assert!(updated.is_some());

        let linked = repo.linked_ids(link, &ids(&["cu1"])).await.unwrap();
        assert_eq!(linked["cu1"], vec!["c3"]);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_changes_nothing() {
        let repo = seeded().await;
        let link = contacts_link();
        let patch = RecordPatch {
            values: Values::new(),
            created_at: None,
            updated_at: now(),
        };

        let updated = repo
            .update(schema("Customer"), "ghost", &patch, &[(link, ids(&["c1"]))])
            .await
            .unwrap();
        assert!(updated.is_none());

        let c1 = repo.find_by_id(schema("Contact"), "c1").await.unwrap().unwrap();
        assert_eq!(c1.get("customer"), FieldValue::Null);
    }

    #[tokio::test]
    async fn test_reads_are_timed_like_writes() {
        let repo = seeded().await;
        repo.count(schema("Activity"), &Filter::new()).await.unwrap();
        repo.linked_ids(contacts_link(), &ids(&["cu1"])).await.unwrap();

        let metrics = gather_metrics();
        let timed = |operation: &str, table: &str| {
            metrics.lines().any(|line| {
                line.starts_with("crud_backends_db_query_duration_seconds_count")
                    && line.contains(&format!("operation=\"{}\"", operation))
                    && line.contains(&format!("table=\"{}\"", table))
            })
        };
        assert!(timed("count", "activities"));
        assert!(timed("linked_ids", "contacts"));
    }
}
