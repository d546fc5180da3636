//! Entity and property descriptors.
//!
//! The mapping layer above this crate describes its entities with explicit
//! metadata instead of runtime reflection: which properties exist, which is
//! the primary key, which are navigation properties or collections and
//! therefore never appear in a generated SELECT.

use serde::{Deserialize, Serialize};

/// What a property holds, from the query generator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// A plain column value.
    Scalar,
    /// A reference to another mapped entity; resolved through joins, never
    /// selected directly.
    Entity,
    /// A collection of related entities.
    Collection,
}

/// One property of a mapped entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Explicit column override; the property name is used when absent.
    pub column: Option<String>,
    pub kind: PropertyKind,
    pub readable: bool,
    pub writable: bool,
    /// Marked as never persisted (computed or transient).
    pub not_mapped: bool,
    pub primary_key: bool,
}

impl PropertyDescriptor {
    /// Create a plain readable/writable scalar property.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            kind: PropertyKind::Scalar,
            readable: true,
            writable: true,
            not_mapped: false,
            primary_key: false,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_kind(mut self, kind: PropertyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Physical column name before mapping overrides.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Whether the property participates in generated SELECT lists.
    ///
    /// Read-only, write-only, unmapped, collection and entity-reference
    /// properties are skipped rather than treated as errors.
    pub fn is_selectable(&self) -> bool {
        self.readable && self.writable && !self.not_mapped && self.kind == PropertyKind::Scalar
    }
}

/// One mapped entity: logical identity plus physical overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Logical type name, e.g. `Order`.
    pub name: String,
    /// Logical namespace, e.g. `Shop.Sales`.
    pub namespace: String,
    /// Explicit physical table name override.
    pub table_override: Option<String>,
    /// Explicit physical schema override.
    pub schema_override: Option<String>,
    /// Name of the data context that owns this entity, for linked-database
    /// resolution.
    pub context: Option<String>,
    /// Columns excluded from default SELECT generation.
    pub excluded_columns: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            table_override: None,
            schema_override: None,
            context: None,
            excluded_columns: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_override = Some(table.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema_override = Some(schema.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_excluded_column(mut self, column: impl Into<String>) -> Self {
        self.excluded_columns.push(column.into());
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// The primary-key property, when one is declared.
    pub fn primary_key(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.primary_key)
    }

    /// Logical table name: override or the type name.
    pub fn table_name(&self) -> &str {
        self.table_override.as_deref().unwrap_or(&self.name)
    }
}
