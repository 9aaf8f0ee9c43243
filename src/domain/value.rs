//! Field values.
//!
//! Decoding of JSON bodies and query-string values into typed column
//! values, with the length, range and enum constraints of each field kind.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::schema::{FieldKind, NUMERIC_MAX, NUMERIC_MIN};

/// A single typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// Rejected input for a field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("{field}: expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("{field}: must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field}: must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    #[error("{field}: must be one of {allowed}")]
    NotAllowed { field: String, allowed: String },
}

impl FieldValue {
    /// Decode a JSON value for a field of the given kind.
    ///
    /// `null` is accepted for every kind.
    pub fn from_json(field: &str, kind: FieldKind, value: &Value) -> Result<Self, ValueError> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        let decoded = match kind {
            FieldKind::Text { .. } | FieldKind::Enum(_) | FieldKind::Secret { .. } => value
                .as_str()
                .map(|s| FieldValue::Text(s.to_string())),
            FieldKind::Float => value.as_f64().map(FieldValue::Float),
            FieldKind::Int => value.as_i64().map(FieldValue::Int),
            FieldKind::Bool => value.as_bool().map(FieldValue::Bool),
            FieldKind::DateTime => value.as_str().and_then(parse_timestamp),
        };

        let decoded = decoded.ok_or_else(|| ValueError::WrongType {
            field: field.to_string(),
            expected: expected_name(kind),
        })?;

        decoded.check(field, kind)?;
        Ok(decoded)
    }

    /// Decode a raw query-string value for a field of the given kind.
    pub fn from_query(field: &str, kind: FieldKind, raw: &str) -> Result<Self, ValueError> {
        let wrong_type = || ValueError::WrongType {
            field: field.to_string(),
            expected: expected_name(kind),
        };

        let decoded = match kind {
            FieldKind::Text { .. } | FieldKind::Enum(_) | FieldKind::Secret { .. } => {
                FieldValue::Text(raw.to_string())
            }
            FieldKind::Float => FieldValue::Float(raw.parse().map_err(|_| wrong_type())?),
            FieldKind::Int => FieldValue::Int(raw.parse().map_err(|_| wrong_type())?),
            FieldKind::Bool => FieldValue::Bool(raw.parse().map_err(|_| wrong_type())?),
            FieldKind::DateTime => parse_timestamp(raw).ok_or_else(wrong_type)?,
        };

        decoded.check(field, kind)?;
        Ok(decoded)
    }

    /// Enforce the constraints of `kind` on an already decoded value.
    fn check(&self, field: &str, kind: FieldKind) -> Result<(), ValueError> {
        match (kind, self) {
            (FieldKind::Text { max_len: Some(max) }, FieldValue::Text(s))
            | (FieldKind::Secret { max_len: Some(max) }, FieldValue::Text(s)) => {
                if s.chars().count() > max {
                    return Err(ValueError::TooLong {
                        field: field.to_string(),
                        max,
                    });
                }
            }
            (FieldKind::Enum(allowed), FieldValue::Text(s)) => {
                if !allowed.contains(&s.as_str()) {
                    return Err(ValueError::NotAllowed {
                        field: field.to_string(),
                        allowed: allowed.join(", "),
                    });
                }
            }
            (FieldKind::Float, FieldValue::Float(n)) => check_range(field, *n)?,
            (FieldKind::Int, FieldValue::Int(n)) => check_range(field, *n as f64)?,
            _ => {}
        }
        Ok(())
    }

    /// Encode for a JSON response.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Float(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls after every value, mismatched
    /// variants compare equal.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Greater,
            (_, FieldValue::Null) => Ordering::Less,
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.total_cmp(b),
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

fn check_range(field: &str, n: f64) -> Result<(), ValueError> {
    if !(NUMERIC_MIN..=NUMERIC_MAX).contains(&n) {
        return Err(ValueError::OutOfRange {
            field: field.to_string(),
            min: NUMERIC_MIN,
            max: NUMERIC_MAX,
        });
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<FieldValue> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
}

fn expected_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text { .. } | FieldKind::Secret { .. } => "a string",
        FieldKind::Enum(_) => "an enum string",
        FieldKind::Float => "a number",
        FieldKind::Int => "an integer",
        FieldKind::Bool => "a boolean",
        FieldKind::DateTime => "an RFC 3339 timestamp",
    }
}
