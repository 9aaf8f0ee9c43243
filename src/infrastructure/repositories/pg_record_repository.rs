//! Record Repository Implementation
//!
//! PostgreSQL implementation of the RecordRepository trait. Statements are
//! assembled with `sqlx::QueryBuilder` from the resource schema, so one
//! implementation serves every table of every catalog.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use crate::domain::query::{Filter, FindManyArgs, SortDirection};
use crate::domain::record::{Record, RecordPatch, RecordRepository, Values};
use crate::domain::schema::{ChildLink, Column, FieldKind, ResourceSchema};
use crate::domain::value::FieldValue;
use crate::infrastructure::metrics::record_db_query;
use crate::shared::error::AppError;

/// PostgreSQL record repository implementation.
#[derive(Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    /// Create a new PgRecordRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bind a value, typing `NULL` after the column so Postgres can infer it.
fn push_value(qb: &mut QueryBuilder<'_, Postgres>, kind: FieldKind, value: &FieldValue) {
    match value {
        FieldValue::Text(s) => qb.push_bind(s.clone()),
        FieldValue::Float(n) => qb.push_bind(*n),
        FieldValue::Int(n) => qb.push_bind(*n),
        FieldValue::Bool(b) => qb.push_bind(*b),
        FieldValue::Timestamp(ts) => qb.push_bind(*ts),
        FieldValue::Null => match kind {
            FieldKind::Float => qb.push_bind(None::<f64>),
            FieldKind::Int => qb.push_bind(None::<i64>),
            FieldKind::Bool => qb.push_bind(None::<bool>),
            FieldKind::DateTime => qb.push_bind(None::<DateTime<Utc>>),
            FieldKind::Text { .. } | FieldKind::Enum(_) | FieldKind::Secret { .. } => {
                qb.push_bind(None::<String>)
            }
        },
    };
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for (i, condition) in filter.conditions.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(condition.column.column);
        if condition.value.is_null() {
            qb.push(" IS NULL");
        } else {
            qb.push(" = ");
            push_value(qb, condition.column.kind, &condition.value);
        }
    }
}

fn decode_value(row: &PgRow, column: Column) -> Result<FieldValue, sqlx::Error> {
    let name = column.column;
    let value = match column.kind {
        FieldKind::Text { .. } | FieldKind::Enum(_) | FieldKind::Secret { .. } => row
            .try_get::<Option<String>, _>(name)?
            .map(FieldValue::Text),
        FieldKind::Float => row.try_get::<Option<f64>, _>(name)?.map(FieldValue::Float),
        FieldKind::Int => row.try_get::<Option<i64>, _>(name)?.map(FieldValue::Int),
        FieldKind::Bool => row.try_get::<Option<bool>, _>(name)?.map(FieldValue::Bool),
        FieldKind::DateTime => row
            .try_get::<Option<DateTime<Utc>>, _>(name)?
            .map(FieldValue::Timestamp),
    };
    Ok(value.unwrap_or(FieldValue::Null))
}

/// Convert a row selected with [`ResourceSchema::select_list`] to a record.
fn decode_row(schema: &'static ResourceSchema, row: &PgRow) -> Result<Record, AppError> {
    let mut values = Values::new();
    for column in schema.stored_columns() {
        values.insert(column.name, decode_value(row, column)?);
    }

    Ok(Record {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        values,
    })
}

/// Map constraint violations onto domain errors.
fn map_write_error(schema: &ResourceSchema, e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("{} with this id already exists", schema.name))
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            AppError::NotFound(format!("Referenced record of {} not found", schema.name))
        }
        _ => AppError::Database(e),
    }
}

fn observe(operation: &str, table: &str, started: Instant) {
    record_db_query(operation, table, started.elapsed().as_secs_f64());
}

/// Byte-order collation, matching how ids and text sort in process.
fn push_order_column(qb: &mut QueryBuilder<'_, Postgres>, column: Column) {
    qb.push(column.column);
    if matches!(column.kind, FieldKind::Text { .. } | FieldKind::Enum(_)) {
        qb.push(" COLLATE \"C\"");
    }
}

fn insert_query(
    schema: &'static ResourceSchema,
    record: &Record,
) -> QueryBuilder<'static, Postgres> {
    let columns: Vec<Column> = schema.stored_columns().collect();

    let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
    qb.push(schema.table).push(" (id, created_at, updated_at");
    for column in &columns {
        qb.push(", ").push(column.column);
    }
    qb.push(") VALUES (");
    {
        let mut values = qb.separated(", ");
        values.push_bind(record.id.clone());
        values.push_bind(record.created_at);
        values.push_bind(record.updated_at);
    }
    for column in &columns {
        qb.push(", ");
        push_value(&mut qb, column.kind, &record.get(column.name));
    }
    qb.push(") RETURNING ").push(schema.select_list());
    qb
}

fn find_many_query(
    schema: &'static ResourceSchema,
    args: &FindManyArgs,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
    qb.push(schema.select_list()).push(" FROM ").push(schema.table);
    push_filter(&mut qb, &args.filter);

    qb.push(" ORDER BY ");
    if let Some(sort) = &args.sort {
        let nulls = match sort.direction {
            SortDirection::Asc => "NULLS LAST",
            SortDirection::Desc => "NULLS FIRST",
        };
        push_order_column(&mut qb, sort.column);
        qb.push(" ")
            .push(sort.direction.as_sql())
            .push(" ")
            .push(nulls)
            .push(", ");
    }
    qb.push("id COLLATE \"C\" ASC");

    if let Some(take) = args.take {
        qb.push(" LIMIT ").push_bind(to_i64(take));
    }
    if let Some(skip) = args.skip {
        qb.push(" OFFSET ").push_bind(to_i64(skip));
    }
    qb
}

/// Saturating conversion for `LIMIT` / `OFFSET` binds.
fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn count_query(
    schema: &'static ResourceSchema,
    filter: &Filter,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
    qb.push(schema.table);
    push_filter(&mut qb, filter);
    qb
}

fn update_query(
    schema: &'static ResourceSchema,
    id: &str,
    patch: &RecordPatch,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
    qb.push(schema.table)
        .push(" SET updated_at = ")
        .push_bind(patch.updated_at);
    if let Some(created_at) = patch.created_at {
        qb.push(", created_at = ").push_bind(created_at);
    }
    for (name, value) in &patch.values {
        let Some(column) = schema.column(name) else {
            continue;
        };
        qb.push(", ").push(column.column).push(" = ");
        push_value(&mut qb, column.kind, value);
    }
    qb.push(" WHERE id = ")
        .push_bind(id.to_string())
        .push(" RETURNING ")
        .push(schema.select_list());
    qb
}

/// Point the children at the parent, skipping those already linked.
fn link_query(
    link: &ChildLink,
    parent_id: &str,
    child_ids: &[String],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
    qb.push(link.child.table)
        .push(" SET ")
        .push(link.column())
        .push(" = ")
        .push_bind(parent_id.to_string())
        .push(" WHERE id = ANY(")
        .push_bind(child_ids.to_vec())
        .push(") AND ")
        .push(link.column())
        .push(" IS DISTINCT FROM ")
        .push_bind(parent_id.to_string());
    qb
}

fn unlink_query(
    link: &ChildLink,
    parent_id: &str,
    child_ids: &[String],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
    qb.push(link.child.table)
        .push(" SET ")
        .push(link.column())
        .push(" = NULL WHERE ")
        .push(link.column())
        .push(" = ")
        .push_bind(parent_id.to_string())
        .push(" AND id = ANY(")
        .push_bind(child_ids.to_vec())
        .push(")");
    qb
}

/// Detach the parent's children that are not in `keep`.
fn detach_query(
    link: &ChildLink,
    parent_id: &str,
    keep: &[String],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
    qb.push(link.child.table)
        .push(" SET ")
        .push(link.column())
        .push(" = NULL WHERE ")
        .push(link.column())
        .push(" = ")
        .push_bind(parent_id.to_string())
        .push(" AND NOT (id = ANY(")
        .push_bind(keep.to_vec())
        .push("))");
    qb
}

fn attach_query(
    link: &ChildLink,
    parent_id: &str,
    child_ids: &[String],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
    qb.push(link.child.table)
        .push(" SET ")
        .push(link.column())
        .push(" = ")
        .push_bind(parent_id.to_string())
        .push(" WHERE id = ANY(")
        .push_bind(child_ids.to_vec())
        .push(")");
    qb
}

/// Detach then attach, inside the caller's transaction.
async fn replace_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    link: &ChildLink,
    parent_id: &str,
    child_ids: &[String],
) -> Result<(), AppError> {
    detach_query(link, parent_id, child_ids)
        .build()
        .execute(&mut **tx)
        .await?;

    if !child_ids.is_empty() {
        attach_query(link, parent_id, child_ids)
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(link.child, e))?;
    }
    Ok(())
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(
        &self,
        schema: &'static ResourceSchema,
        record: Record,
        children: &[(ChildLink, Vec<String>)],
    ) -> Result<Record, AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let row = insert_query(schema, &record)
            .build()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(schema, e))?;

        for (link, ids) in children.iter().filter(|(_, ids)| !ids.is_empty()) {
            link_query(link, &record.id, ids)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_write_error(link.child, e))?;
        }

        tx.commit().await?;
        observe("insert", schema.table, started);

        decode_row(schema, &row)
    }

    async fn find_by_id(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
    ) -> Result<Option<Record>, AppError> {
        let started = Instant::now();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(schema.select_list())
            .push(" FROM ")
            .push(schema.table)
            .push(" WHERE id = ")
            .push_bind(id.to_string());

        let row = qb.build().fetch_optional(&self.pool).await?;
        observe("find_by_id", schema.table, started);

        row.map(|r| decode_row(schema, &r)).transpose()
    }

    async fn find_many(
        &self,
        schema: &'static ResourceSchema,
        args: &FindManyArgs,
    ) -> Result<Vec<Record>, AppError> {
        let started = Instant::now();
        let rows = find_many_query(schema, args)
            .build()
            .fetch_all(&self.pool)
            .await?;
        observe("find_many", schema.table, started);

        rows.iter().map(|r| decode_row(schema, r)).collect()
    }

    async fn count(
        &self,
        schema: &'static ResourceSchema,
        filter: &Filter,
    ) -> Result<u64, AppError> {
        let started = Instant::now();
        let count: i64 = count_query(schema, filter)
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;
        observe("count", schema.table, started);

        Ok(count.max(0) as u64)
    }

    async fn update(
        &self,
        schema: &'static ResourceSchema,
        id: &str,
        patch: &RecordPatch,
        children: &[(ChildLink, Vec<String>)],
    ) -> Result<Option<Record>, AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let row = update_query(schema, id, patch)
            .build()
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_write_error(schema, e))?;
        // Dropping the transaction rolls it back.
        let Some(row) = row else {
            return Ok(None);
        };

        for (link, ids) in children {
            replace_in_tx(&mut tx, link, id, ids).await?;
        }

        tx.commit().await?;
        observe("update", schema.table, started);

        decode_row(schema, &row).map(Some)
    }

    async fn delete(&self, schema: &'static ResourceSchema, id: &str) -> Result<bool, AppError> {
        let started = Instant::now();
        // Children are detached by ON DELETE SET NULL.
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM ");
        qb.push(schema.table)
            .push(" WHERE id = ")
            .push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        observe("delete", schema.table, started);

        Ok(result.rows_affected() > 0)
    }

    async fn existing_ids(
        &self,
        schema: &'static ResourceSchema,
        ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM ");
        qb.push(schema.table)
            .push(" WHERE id = ANY(")
            .push_bind(ids.to_vec())
            .push(") ORDER BY id COLLATE \"C\"");

        let rows = qb.build().fetch_all(&self.pool).await?;
        observe("existing_ids", schema.table, started);

        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map_err(AppError::from))
            .collect()
    }

    async fn linked_ids(
        &self,
        link: ChildLink,
        parent_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, AppError> {
        let mut linked: HashMap<String, Vec<String>> = HashMap::new();
        if parent_ids.is_empty() {
            return Ok(linked);
        }

        let started = Instant::now();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(link.column())
            .push(" AS parent_id, id FROM ")
            .push(link.child.table)
            .push(" WHERE ")
            .push(link.column())
            .push(" = ANY(")
            .push_bind(parent_ids.to_vec())
            .push(") ORDER BY id COLLATE \"C\"");

        let rows = qb.build().fetch_all(&self.pool).await?;
        observe("linked_ids", link.child.table, started);

        for row in rows {
            let parent: String = row.try_get("parent_id")?;
            let child: String = row.try_get("id")?;
            linked.entry(parent).or_default().push(child);
        }
        Ok(linked)
    }

    async fn link(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<u64, AppError> {
        if child_ids.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let result = link_query(&link, parent_id, child_ids)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(link.child, e))?;
        observe("link", link.child.table, started);

        Ok(result.rows_affected())
    }

    async fn unlink(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<u64, AppError> {
        if child_ids.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let result = unlink_query(&link, parent_id, child_ids)
            .build()
            .execute(&self.pool)
            .await?;
        observe("unlink", link.child.table, started);

        Ok(result.rows_affected())
    }

    async fn replace_links(
        &self,
        link: ChildLink,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<(), AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        replace_in_tx(&mut tx, &link, parent_id, child_ids).await?;
        tx.commit().await?;
        observe("replace_links", link.child.table, started);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalogs::CRM;
    use crate::domain::query::SortKey;
    use crate::domain::record::{now, Values};
    use pretty_assertions::assert_eq;
    use sqlx::error::{DatabaseError, ErrorKind};

    fn schema(name: &str) -> &'static ResourceSchema {
        CRM.resource(name).unwrap()
    }

    fn leads_link() -> ChildLink {
        let customers = schema("Customer");
        CRM.child_link(customers.relation("leads").unwrap()).unwrap()
    }

    #[test]
    fn test_find_many_filters_sorts_then_paginates() {
        let opportunities = schema("Opportunity");
        let args = FindManyArgs {
            filter: Filter::new()
                .and(
                    opportunities.column("stage").unwrap(),
                    FieldValue::Text("Proposal".into()),
                )
                .and(opportunities.column("customer").unwrap(), FieldValue::Null),
            sort: Some(SortKey {
                column: opportunities.column("amount").unwrap(),
                direction: SortDirection::Desc,
            }),
            skip: Some(20),
            take: Some(10),
        };

        let qb = find_many_query(opportunities, &args);
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {} FROM opportunities WHERE stage = $1 AND customer_id IS NULL \
                 ORDER BY amount DESC NULLS FIRST, id COLLATE \"C\" ASC LIMIT $2 OFFSET $3",
                opportunities.select_list()
            )
        );
    }

    #[test]
    fn test_text_sort_uses_byte_order_collation() {
        let leads = schema("Lead");
        let args = FindManyArgs {
            sort: Some(SortKey {
                column: leads.column("name").unwrap(),
                direction: SortDirection::Asc,
            }),
            ..Default::default()
        };

        let qb = find_many_query(leads, &args);
        assert!(qb
            .sql()
            .ends_with("ORDER BY name COLLATE \"C\" ASC NULLS LAST, id COLLATE \"C\" ASC"));
    }

    #[test]
    fn test_pagination_never_binds_a_negative_limit() {
        assert_eq!(to_i64(u64::MAX), i64::MAX);
        assert_eq!(to_i64(25), 25);
    }

    #[test]
    fn test_count_without_filter() {
        let qb = count_query(schema("Lead"), &Filter::new());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM leads");
    }

    #[test]
    fn test_update_sets_only_patched_columns() {
        let contacts = schema("Contact");
        let patch = RecordPatch {
            values: Values::from([
                ("customer", FieldValue::Text("cu1".into())),
                ("firstName", FieldValue::Null),
            ]),
            created_at: None,
            updated_at: now(),
        };

        let qb = update_query(contacts, "c1", &patch);
        assert_eq!(
            qb.sql(),
            format!(
                "UPDATE contacts SET updated_at = $1, customer_id = $2, first_name = $3 \
                 WHERE id = $4 RETURNING {}",
                contacts.select_list()
            )
        );
    }

    #[test]
    fn test_replace_links_detaches_then_attaches() {
        let link = leads_link();
        let ids = vec!["l1".to_string()];

        assert_eq!(
            detach_query(&link, "cu1", &ids).sql(),
            "UPDATE leads SET customer_id = NULL WHERE customer_id = $1 AND NOT (id = ANY($2))"
        );
        assert_eq!(
            attach_query(&link, "cu1", &ids).sql(),
            "UPDATE leads SET customer_id = $1 WHERE id = ANY($2)"
        );
    }

    #[test]
    fn test_link_skips_children_already_linked() {
        let qb = link_query(&leads_link(), "cu1", &["l1".to_string()]);
        assert_eq!(
            qb.sql(),
            "UPDATE leads SET customer_id = $1 WHERE id = ANY($2) AND customer_id IS DISTINCT FROM $3"
        );
    }

    #[test]
    fn test_insert_lists_every_stored_column() {
        let at = now();
        let record = Record {
            id: "l1".into(),
            created_at: at,
            updated_at: at,
            values: Values::new(),
        };

        let qb = insert_query(schema("Lead"), &record);
        assert!(qb.sql().starts_with(
            "INSERT INTO leads (id, created_at, updated_at, name, email, source, status, customer_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING "
        ));
    }

    #[derive(Debug)]
    enum Violation {
        Unique,
        ForeignKey,
        Check,
    }

    impl std::fmt::Display for Violation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "constraint violated: {:?}", self)
        }
    }

    impl std::error::Error for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self {
                Violation::Unique => ErrorKind::UniqueViolation,
                Violation::ForeignKey => ErrorKind::ForeignKeyViolation,
                Violation::Check => ErrorKind::CheckViolation,
            }
        }
    }

    fn violation(v: Violation) -> sqlx::Error {
        sqlx::Error::Database(Box::new(v))
    }

    #[test]
    fn test_constraint_violations_map_to_domain_errors() {
        let leads = schema("Lead");

        assert!(matches!(
            map_write_error(leads, violation(Violation::Unique)),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            map_write_error(leads, violation(Violation::ForeignKey)),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            map_write_error(leads, violation(Violation::Check)),
            AppError::Database(_)
        ));
        assert!(matches!(
            map_write_error(leads, sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }
}
