//! Response DTOs
//!
//! Data structures for API response bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::record::Record;
use crate::domain::schema::ResourceSchema;

/// Externally visible JSON shape of a record.
///
/// Carries `id`, `createdAt`, `updatedAt`, every readable field, each
/// belongs-to relation as the referenced id and each has-many relation as
/// the list of child ids. Secret fields never appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDto(pub Map<String, Value>);

impl ResourceDto {
    /// Shape a record; `children` maps has-many relation names to child ids.
    pub fn from_record(
        schema: &'static ResourceSchema,
        record: &Record,
        children: &HashMap<&'static str, Vec<String>>,
    ) -> Self {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(record.id.clone()));
        map.insert("createdAt".into(), record.get("createdAt").to_json());
        map.insert("updatedAt".into(), record.get("updatedAt").to_json());

        for field in schema.fields.iter().filter(|f| f.kind.is_readable()) {
            map.insert(field.name.into(), record.get(field.name).to_json());
        }
        for relation in schema.belongs_to() {
            map.insert(relation.name.into(), record.get(relation.name).to_json());
        }
        for relation in schema.has_many() {
            let ids = children.get(relation.name).cloned().unwrap_or_default();
            map.insert(
                relation.name.into(),
                Value::Array(ids.into_iter().map(Value::String).collect()),
            );
        }

        Self(map)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Count of records matching a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDto {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalogs::{CAR_RENTAL, RESERVATION};
    use crate::domain::record::{now, Values};
    use crate::domain::value::FieldValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_dto_hides_secrets_and_lists_relations() {
        let user = RESERVATION.resource("User").unwrap();
        let at = now();
        let record = Record {
            id: "u1".into(),
            created_at: at,
            updated_at: at,
            values: Values::from([
                ("username", FieldValue::Text("ann".into())),
                ("password", FieldValue::Text("$argon2id$hash".into())),
            ]),
        };
        let children = HashMap::from([("reviews", vec!["r1".to_string(), "r2".to_string()])]);

        let dto = ResourceDto::from_record(user, &record, &children);

        assert!(dto.get("password").is_none());
        assert_eq!(dto.get("username"), Some(&json!("ann")));
        assert_eq!(dto.get("firstName"), Some(&Value::Null));
        assert_eq!(dto.get("reviews"), Some(&json!(["r1", "r2"])));
        assert_eq!(dto.get("reservations"), Some(&json!([])));
    }

    #[test]
    fn test_dto_renders_belongs_to_as_id() {
        let user = CAR_RENTAL.resource("User").unwrap();
        let at = now();
        let record = Record {
            id: "u1".into(),
            created_at: at,
            updated_at: at,
            values: Values::from([("role", FieldValue::Text("admin".into()))]),
        };

        let dto = ResourceDto::from_record(user, &record, &HashMap::new());

        assert_eq!(dto.id(), Some("u1"));
        assert_eq!(dto.get("role"), Some(&json!("admin")));
    }
}
