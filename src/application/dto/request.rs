//! Request DTOs
//!
//! Decoding of request bodies and query strings against a resource schema.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::domain::query::{Filter, FindManyArgs, SortDirection, SortKey};
use crate::domain::record::Values;
use crate::domain::schema::{Column, FieldKind, RelationDef, RelationKind, ResourceSchema};
use crate::domain::value::FieldValue;
use crate::shared::error::AppError;

/// Reference to one record by id, as used in relation bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WhereUniqueInput {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: String,
}

impl WhereUniqueInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A create or update body, decoded against a resource schema.
///
/// Keys absent from the body are absent here; an explicit `null` is kept as
/// [`FieldValue::Null`] so updates can clear a column.
#[derive(Debug, Clone, Default)]
pub struct RecordInput {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Scalar fields and belongs-to foreign keys.
    pub values: Values,
    /// Has-many collections with the listed child ids.
    pub children: Vec<(&'static RelationDef, Vec<String>)>,
}

impl RecordInput {
    /// Decode a JSON body. Unknown keys are rejected.
    pub fn parse(schema: &'static ResourceSchema, body: Value) -> Result<Self, AppError> {
        let Value::Object(map) = body else {
            return Err(AppError::BadRequest("Request body must be a JSON object".into()));
        };
        Self::from_map(schema, map)
    }

    fn from_map(schema: &'static ResourceSchema, map: Map<String, Value>) -> Result<Self, AppError> {
        let mut input = RecordInput::default();

        for (key, value) in map {
            match key.as_str() {
                "id" => input.id = parse_id(&value)?,
                "createdAt" => input.created_at = parse_timestamp("createdAt", &value)?,
                "updatedAt" => input.updated_at = parse_timestamp("updatedAt", &value)?,
                _ => {
                    if let Some(field) = schema.field(&key) {
                        let decoded = FieldValue::from_json(field.name, field.kind, &value)?;
                        input.values.insert(field.name, decoded);
                    } else if let Some(relation) = schema.relations.iter().find(|r| r.name == key) {
                        match relation.kind {
                            RelationKind::BelongsTo { .. } => {
                                let reference = parse_reference(relation.name, &value)?;
                                input.values.insert(relation.name, reference);
                            }
                            RelationKind::HasMany { .. } => {
                                let ids = parse_reference_list(relation.name, &value)?;
                                input.children.push((relation, ids));
                            }
                        }
                    } else {
                        return Err(AppError::BadRequest(format!(
                            "Unknown field '{}' for {}",
                            key, schema.name
                        )));
                    }
                }
            }
        }

        Ok(input)
    }
}

fn parse_id(value: &Value) -> Result<Option<String>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if !s.is_empty() => Ok(Some(s.clone())),
        Value::String(_) => Err(AppError::Validation("id: must not be empty".into())),
        _ => Err(AppError::Validation("id: expected a string".into())),
    }
}

fn parse_timestamp(field: &str, value: &Value) -> Result<Option<DateTime<Utc>>, AppError> {
    match FieldValue::from_json(field, FieldKind::DateTime, value)? {
        FieldValue::Timestamp(ts) => Ok(Some(ts)),
        _ => Ok(None),
    }
}

/// A belongs-to value: an id string, `{ "id": ... }`, or `null`.
fn parse_reference(field: &str, value: &Value) -> Result<FieldValue, AppError> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        other => reference_id(field, other).map(FieldValue::Text),
    }
}

fn parse_reference_list(field: &str, value: &Value) -> Result<Vec<String>, AppError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(|item| reference_id(field, item)).collect(),
        _ => Err(AppError::Validation(format!("{}: expected an array of ids", field))),
    }
}

fn reference_id(field: &str, value: &Value) -> Result<String, AppError> {
    let id = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str),
        _ => None,
    };
    match id {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(AppError::Validation(format!(
            "{}: expected an id or an object with an id",
            field
        ))),
    }
}

/// Query-string keys that are not filters.
const SKIP: &str = "skip";
const TAKE: &str = "take";
const SORT_BY: &str = "sortBy";

/// Build find-many arguments from query parameters.
///
/// `skip`, `take` and `sortBy=field[:asc|desc]` are reserved; every other
/// key is an equality filter on a readable column.
pub fn find_many_args(
    schema: &'static ResourceSchema,
    params: &HashMap<String, String>,
) -> Result<FindManyArgs, AppError> {
    let mut args = FindManyArgs {
        filter: filter_from_query(schema, params)?,
        ..Default::default()
    };

    if let Some(raw) = params.get(SKIP) {
        args.skip = Some(parse_count(SKIP, raw)?);
    }
    if let Some(raw) = params.get(TAKE) {
        args.take = Some(parse_count(TAKE, raw)?);
    }
    if let Some(raw) = params.get(SORT_BY) {
        args.sort = Some(parse_sort(schema, raw)?);
    }

    Ok(args)
}

/// Build only the filter part of the query, ignoring pagination and sort.
pub fn filter_from_query(
    schema: &'static ResourceSchema,
    params: &HashMap<String, String>,
) -> Result<Filter, AppError> {
    // Sorted for a stable condition order.
    let mut keys: Vec<&String> = params
        .keys()
        .filter(|k| ![SKIP, TAKE, SORT_BY].contains(&k.as_str()))
        .collect();
    keys.sort();

    let mut filter = Filter::new();
    for key in keys {
        let column = readable_column(schema, key)?;
        let raw = &params[key];
        let value = if raw.eq_ignore_ascii_case("null") && !is_text(column.kind) {
            FieldValue::Null
        } else {
            FieldValue::from_query(column.name, column.kind, raw)?
        };
        filter = filter.and(column, value);
    }
    Ok(filter)
}

fn is_text(kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Text { .. })
}

fn readable_column(schema: &'static ResourceSchema, name: &str) -> Result<Column, AppError> {
    schema
        .column(name)
        .filter(|c| c.kind.is_readable())
        .ok_or_else(|| {
            AppError::BadRequest(format!("Cannot filter or sort {} by '{}'", schema.name, name))
        })
}

/// A non-negative count that also fits a SQL `BIGINT`.
fn parse_count(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| AppError::Validation(format!("{}: expected a non-negative integer", name)))
}

fn parse_sort(schema: &'static ResourceSchema, raw: &str) -> Result<SortKey, AppError> {
    let (name, direction) = match raw.split_once(':') {
        Some((name, dir)) if dir.eq_ignore_ascii_case("asc") => (name, SortDirection::Asc),
        Some((name, dir)) if dir.eq_ignore_ascii_case("desc") => (name, SortDirection::Desc),
        Some(_) => {
            return Err(AppError::Validation(
                "sortBy: direction must be asc or desc".into(),
            ))
        }
        None => (raw, SortDirection::Asc),
    };

    Ok(SortKey {
        column: readable_column(schema, name)?,
        direction,
    })
}
