//! Table and field name resolution for query generation.
//!
//! The query builder above this crate works with logical entity metadata;
//! everything physical is resolved here: schema derivation,
//! linked-database prefixes, primary-key naming, per-dialect SELECT
//! fragments and aliasing.

use crate::dialect::Dialect;
use crate::entity::{EntityDescriptor, PropertyDescriptor};
use crate::naming::NameMapper;

/// One table occurrence inside a query being generated.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub entity: EntityDescriptor,
    pub alias: String,
    /// Properties excluded by this particular query.
    pub excluded_properties: Vec<String>,
}

impl TableRef {
    pub fn new(entity: EntityDescriptor, alias: impl Into<String>) -> Self {
        Self {
            entity,
            alias: alias.into(),
            excluded_properties: Vec::new(),
        }
    }

    pub fn with_excluded_property(mut self, name: impl Into<String>) -> Self {
        self.excluded_properties.push(name.into());
        self
    }
}

/// Resolves entity metadata into dialect-correct physical names.
#[derive(Clone)]
pub struct SelectResolver {
    mapper: NameMapper,
}

impl SelectResolver {
    pub fn new(mapper: NameMapper) -> Self {
        Self { mapper }
    }

    pub fn dialect(&self) -> Dialect {
        self.mapper.dialect()
    }

    pub fn mapper(&self) -> &NameMapper {
        &self.mapper
    }

    /// Derive the physical schema for an entity: namespace with the
    /// configured segments stripped, then mapped.
    pub fn schema(&self, entity: &EntityDescriptor) -> String {
        let mut schema = entity.namespace.clone();
        for key in &self.mapper.config().namespaces_to_ignore {
            schema = schema.replace(key.as_str(), "").trim_matches('.').to_string();
        }
        self.mapper.map_namespace(&schema)
    }

    /// Fully qualified, quoted physical table name for an entity.
    pub fn table_name(&self, entity: &EntityDescriptor) -> String {
        self.table_name_with(entity, true)
    }

    /// Physical table name without quoting, as used for derived object
    /// names (sequences).
    pub fn table_name_unformatted(&self, entity: &EntityDescriptor) -> String {
        self.table_name_with(entity, false)
    }

    fn table_name_with(&self, entity: &EntityDescriptor, format: bool) -> String {
        // An explicit table override replaces both the name and the derived
        // schema.
        let (name, schema) = match &entity.table_override {
            Some(table) => (
                table.clone(),
                entity.schema_override.clone().unwrap_or_default(),
            ),
            None => (entity.name.clone(), self.schema(entity)),
        };

        let mut database_name = String::new();
        if self.mapper.config().allow_linked_databases {
            if let Some(context) = &entity.context {
                if let Some(db) = self.mapper.config().linked_databases.get(context) {
                    database_name = db.clone();
                }
            }
        }

        self.qualified_table_name(&schema, &name, format, &database_name)
    }

    /// Compose a qualified table name from already-logical parts.
    pub fn qualified_table_name(
        &self,
        schema: &str,
        name: &str,
        format: bool,
        database_name: &str,
    ) -> String {
        let mut out = String::new();
        if !database_name.is_empty() {
            out.push_str(&self.mapper.format_data_element(database_name));
            out.push('.');
        }

        let table = self.mapper.map_table(name);
        if format {
            if self.mapper.config().use_namespace_as_schema && !schema.is_empty() {
                let mapped_schema = self.mapper.map_namespace(schema).replace('.', "_");
                out.push_str(&self.mapper.format_data_element(&mapped_schema));
                out.push('.');
                out.push_str(&self.mapper.format_data_element(&table));
            } else if !schema.is_empty() && !self.mapper.config().use_namespace_as_schema {
                let mapped_schema = self.mapper.map_namespace(schema).replace('.', "_");
                out.push_str(
                    &self
                        .mapper
                        .format_data_element(&format!("{mapped_schema}_{table}")),
                );
            } else {
                out.push_str(&self.mapper.format_data_element(&table));
            }
        } else if !schema.is_empty() {
            let mapped_schema = self.mapper.map_namespace(schema).replace('.', "_");
            out.push_str(&format!("{mapped_schema}_{table}"));
        } else {
            out.push_str(&table);
        }
        out
    }

    /// Quoted primary-key column name, optionally prefixed with the entity
    /// name to keep joins unambiguous. None when no key property is
    /// declared.
    pub fn primary_key_name(&self, entity: &EntityDescriptor) -> Option<String> {
        let pk = entity.primary_key()?;
        let column = pk.column_name();
        let key = if self.mapper.config().primary_key_contains_entity_name {
            format!("{}{}", entity.name, column)
        } else {
            column.to_string()
        };
        Some(self.mapper.format_data_element(&self.mapper.map_field(&key)))
    }

    /// One SELECT-list fragment for a scalar property, or empty when the
    /// property does not participate in generated selects.
    ///
    /// In XML mode PostgreSQL and Oracle wrap the column in an XMLELEMENT
    /// constructor; SQL Server aliases sub-table columns unconditionally,
    /// the others only in XML or nested-select modes.
    pub fn field_select_string(
        &self,
        table: &TableRef,
        property: &PropertyDescriptor,
        is_sub_table: bool,
        load_as_xml: bool,
    ) -> String {
        if !property.is_selectable() {
            return String::new();
        }

        let dialect = self.dialect();
        let field_name = property.column_name();
        let alias = self
            .mapper
            .format_data_element(&self.mapper.map_field(&format!("{}_{}", table.alias, field_name)));

        let mut out = String::new();
        if is_sub_table && load_as_xml {
            match dialect {
                Dialect::PostgreSql => {
                    out.push_str("XMLELEMENT(name ");
                    out.push_str(&alias);
                    out.push_str(", ");
                }
                Dialect::Oracle => {
                    out.push_str("XMLELEMENT(");
                    out.push_str(&alias);
                    out.push_str(", ");
                }
                Dialect::SqlServer | Dialect::MySql => {}
            }
        }

        out.push_str(&table.alias);
        out.push('.');
        out.push_str(&self.mapper.format_data_element(&self.mapper.map_field(field_name)));

        if is_sub_table && dialect == Dialect::SqlServer {
            out.push_str(" AS ");
            out.push_str(&alias);
        }
        if is_sub_table
            && load_as_xml
            && matches!(dialect, Dialect::PostgreSql | Dialect::Oracle)
        {
            out.push(')');
        } else if is_sub_table
            && !load_as_xml
            && matches!(
                dialect,
                Dialect::MySql | Dialect::PostgreSql | Dialect::Oracle
            )
        {
            out.push_str(" AS ");
            out.push_str(&alias);
        }

        out
    }

    /// The full SELECT list for a table occurrence, comma separated.
    pub fn all_select_fields(
        &self,
        table: &TableRef,
        is_sub_table: bool,
        load_as_xml: bool,
    ) -> String {
        let mut parts = Vec::new();
        for property in &table.entity.properties {
            if table
                .excluded_properties
                .iter()
                .any(|name| name == &property.name)
            {
                continue;
            }
            if table
                .entity
                .excluded_columns
                .iter()
                .any(|name| name == &property.name)
            {
                continue;
            }
            let fragment = self.field_select_string(table, property, is_sub_table, load_as_xml);
            if !fragment.is_empty() {
                parts.push(fragment);
            }
        }
        parts.join(",")
    }
}
