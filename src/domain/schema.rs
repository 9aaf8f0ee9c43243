//! Resource schemas.
//!
//! Every business entity is described once, statically, by a
//! [`ResourceSchema`]: its table, its scalar fields with their constraints,
//! and its relations to sibling resources. The generic CRUD engine reads
//! these descriptions instead of carrying one hand-written service per
//! entity.

/// Lower bound accepted for numeric fields.
pub const NUMERIC_MIN: f64 = -999_999_999.0;

/// Upper bound accepted for numeric fields.
pub const NUMERIC_MAX: f64 = 999_999_999.0;

/// Default length limit of short text columns.
pub const TEXT_MAX_LEN: usize = 1000;

/// Storage and validation kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, optionally limited in characters.
    Text { max_len: Option<usize> },
    /// Double precision number within [`NUMERIC_MIN`, `NUMERIC_MAX`].
    Float,
    /// Integer within [`NUMERIC_MIN`, `NUMERIC_MAX`].
    Int,
    Bool,
    /// UTC timestamp, RFC 3339 on the wire.
    DateTime,
    /// Text restricted to a fixed set of values.
    Enum(&'static [&'static str]),
    /// Write-only text stored as an Argon2 hash.
    Secret { max_len: Option<usize> },
}

impl FieldKind {
    /// Whether values of this kind may appear in filters, sorts and DTOs.
    pub fn is_readable(&self) -> bool {
        !matches!(self, FieldKind::Secret { .. })
    }
}

/// A scalar attribute of a resource.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Name in JSON bodies and query strings (camelCase).
    pub name: &'static str,
    /// Column name in the table (snake_case).
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }

    /// Text limited to [`TEXT_MAX_LEN`] characters.
    pub const fn text(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Text { max_len: Some(TEXT_MAX_LEN) })
    }

    /// Unbounded text (e-mail addresses and the like).
    pub const fn free_text(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Text { max_len: None })
    }

    pub const fn float(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Float)
    }

    pub const fn int(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Int)
    }

    pub const fn boolean(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Bool)
    }

    pub const fn datetime(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::DateTime)
    }

    pub const fn one_of(
        name: &'static str,
        column: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self::new(name, column, FieldKind::Enum(values))
    }

    pub const fn secret(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Secret { max_len: Some(TEXT_MAX_LEN) })
    }
}

/// How two resources are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Nullable foreign key stored on this resource's table.
    BelongsTo { column: &'static str },
    /// Children whose `inverse` belongs-to relation points at this resource.
    HasMany { inverse: &'static str },
}

/// A navigation property from one resource to another.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    /// Name of the target resource (e.g. `"OrderItem"`).
    pub target: &'static str,
    pub kind: RelationKind,
}

impl RelationDef {
    pub const fn belongs_to(name: &'static str, target: &'static str, column: &'static str) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::BelongsTo { column },
        }
    }

    pub const fn has_many(name: &'static str, target: &'static str, inverse: &'static str) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::HasMany { inverse },
        }
    }

    /// Foreign key column, for belongs-to relations.
    pub fn column(&self) -> Option<&'static str> {
        match self.kind {
            RelationKind::BelongsTo { column } => Some(column),
            RelationKind::HasMany { .. } => None,
        }
    }
}

/// A resolved, addressable column of a resource.
///
/// Covers the built-in `id` / `createdAt` / `updatedAt` columns, scalar
/// fields, and belongs-to foreign keys (addressed by relation name).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

const ID_COLUMN: Column = Column {
    name: "id",
    column: "id",
    kind: FieldKind::Text { max_len: None },
};

const CREATED_AT_COLUMN: Column = Column {
    name: "createdAt",
    column: "created_at",
    kind: FieldKind::DateTime,
};

const UPDATED_AT_COLUMN: Column = Column {
    name: "updatedAt",
    column: "updated_at",
    kind: FieldKind::DateTime,
};

/// Static description of one resource.
#[derive(Debug)]
pub struct ResourceSchema {
    /// Singular entity name (e.g. `"OrderItem"`).
    pub name: &'static str,
    /// Plural URL segment (e.g. `"orderItems"`).
    pub path: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
}

impl ResourceSchema {
    /// Look up a scalar field by JSON name.
    pub fn field(&'static self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a relation by name, ignoring ASCII case.
    pub fn relation(&'static self, name: &str) -> Option<&'static RelationDef> {
        self.relations
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn belongs_to(&'static self) -> impl Iterator<Item = &'static RelationDef> {
        self.relations
            .iter()
            .filter(|r| matches!(r.kind, RelationKind::BelongsTo { .. }))
    }

    pub fn has_many(&'static self) -> impl Iterator<Item = &'static RelationDef> {
        self.relations
            .iter()
            .filter(|r| matches!(r.kind, RelationKind::HasMany { .. }))
    }

    /// Resolve a name to a column: built-ins, fields, then belongs-to keys.
    pub fn column(&'static self, name: &str) -> Option<Column> {
        match name {
            "id" => return Some(ID_COLUMN),
            "createdAt" => return Some(CREATED_AT_COLUMN),
            "updatedAt" => return Some(UPDATED_AT_COLUMN),
            _ => {}
        }

        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return Some(Column {
                name: field.name,
                column: field.column,
                kind: field.kind,
            });
        }

        self.belongs_to()
            .find(|r| r.name == name)
            .and_then(|r| Some(Self::foreign_key(r, r.column()?)))
    }

    /// Columns stored besides the built-ins: fields then foreign keys.
    pub fn stored_columns(&'static self) -> impl Iterator<Item = Column> {
        let fields = self.fields.iter().map(|f| Column {
            name: f.name,
            column: f.column,
            kind: f.kind,
        });
        let keys = self
            .belongs_to()
            .filter_map(|r| r.column().map(|column| Self::foreign_key(r, column)));
        fields.chain(keys)
    }

    fn foreign_key(relation: &'static RelationDef, column: &'static str) -> Column {
        Column {
            name: relation.name,
            column,
            kind: FieldKind::Text { max_len: None },
        }
    }

    /// Comma separated list of every stored column, built-ins first.
    pub fn select_list(&'static self) -> String {
        let mut columns = vec!["id", "created_at", "updated_at"];
        columns.extend(self.stored_columns().map(|c| c.column));
        columns.join(", ")
    }
}

/// The children side of a has-many relation: the child resource and the
/// belongs-to relation on it that holds the parent's id.
#[derive(Debug, Clone, Copy)]
pub struct ChildLink {
    pub child: &'static ResourceSchema,
    pub relation: &'static RelationDef,
}

impl ChildLink {
    /// Foreign key column on the child table.
    pub fn column(&self) -> &'static str {
        self.relation.column().unwrap_or("id")
    }

    pub fn as_column(&self) -> Column {
        Column {
            name: self.relation.name,
            column: self.column(),
            kind: FieldKind::Text { max_len: None },
        }
    }
}

/// The set of resources served by one backend.
#[derive(Debug)]
pub struct Catalog {
    pub name: &'static str,
    pub resources: &'static [ResourceSchema],
}

impl Catalog {
    /// Find a resource by URL segment, ignoring ASCII case.
    pub fn resource_by_path(&'static self, path: &str) -> Option<&'static ResourceSchema> {
        self.resources
            .iter()
            .find(|r| r.path.eq_ignore_ascii_case(path))
    }

    /// Find a resource by entity name.
    pub fn resource(&'static self, name: &str) -> Option<&'static ResourceSchema> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resolve the children side of a has-many relation.
    pub fn child_link(&'static self, relation: &RelationDef) -> Option<ChildLink> {
        let RelationKind::HasMany { inverse } = relation.kind else {
            return None;
        };
        let child = self.resource(relation.target)?;
        let inverse = child.belongs_to().find(|r| r.name == inverse)?;
        Some(ChildLink {
            child,
            relation: inverse,
        })
    }

    /// Every belongs-to relation, across the catalog, that targets `name`.
    pub fn referencing(&'static self, name: &'static str) -> impl Iterator<Item = ChildLink> {
        self.resources.iter().flat_map(move |child| {
            child
                .belongs_to()
                .filter(move |r| r.target == name)
                .map(move |relation| ChildLink { child, relation })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalogs::{ALL_CATALOGS, CAR_RENTAL};

    #[test]
    fn test_every_has_many_resolves_to_an_inverse_pointing_back() {
        for catalog in ALL_CATALOGS {
            for resource in catalog.resources {
                for relation in resource.has_many() {
                    let link = catalog.child_link(relation).unwrap_or_else(|| {
                        panic!("{}.{} has no inverse", resource.name, relation.name)
                    });
                    assert_eq!(link.relation.target, resource.name);
                }
            }
        }
    }

    #[test]
    fn test_every_belongs_to_targets_a_known_resource() {
        for catalog in ALL_CATALOGS {
            for resource in catalog.resources {
                for relation in resource.belongs_to() {
                    assert!(
                        catalog.resource(relation.target).is_some(),
                        "{}.{} targets unknown {}",
                        resource.name,
                        relation.name,
                        relation.target
                    );
                }
            }
        }
    }

    #[test]
    fn test_paths_and_names_are_unique_per_catalog() {
        for catalog in ALL_CATALOGS {
            let mut paths: Vec<_> = catalog
                .resources
                .iter()
                .map(|r| r.path.to_ascii_lowercase())
                .collect();
            paths.sort();
            paths.dedup();
            assert_eq!(paths.len(), catalog.resources.len());
        }
    }

    #[test]
    fn test_resource_lookup_ignores_case() {
        let by_lower = CAR_RENTAL.resource_by_path("orderitems");
        let by_pascal = CAR_RENTAL.resource_by_path("OrderItems");
        assert_eq!(by_lower.map(|r| r.name), Some("OrderItem"));
        assert_eq!(by_pascal.map(|r| r.name), Some("OrderItem"));
        assert!(CAR_RENTAL.resource_by_path("invoices").is_none());
    }

    #[test]
    fn test_column_resolution() {
        let order = CAR_RENTAL.resource("Order").unwrap();

        assert_eq!(order.column("id").map(|c| c.column), Some("id"));
        assert_eq!(order.column("createdAt").map(|c| c.column), Some("created_at"));
        assert_eq!(order.column("orderDate").map(|c| c.kind), Some(FieldKind::DateTime));
        assert_eq!(order.column("orderItem").map(|c| c.column), Some("order_item_id"));
        assert!(order.column("nope").is_none());
    }

    #[test]
    fn test_select_list_starts_with_builtins() {
        let role = CAR_RENTAL.resource("Role").unwrap();
        assert_eq!(role.select_list(), "id, created_at, updated_at, name, description");
    }

    #[test]
    fn test_referencing_finds_children_tables() {
        let links: Vec<_> = CAR_RENTAL.referencing("Customer").map(|l| l.child.name).collect();
        assert_eq!(links, vec!["Order"]);
    }
}
