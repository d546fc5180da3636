//! Logical-to-physical name mapping.
//!
//! Resolution is deterministic and pure given the configuration: an
//! override-map lookup, optional uppercasing, then truncation to the
//! configured character limit. Absent entries pass through unchanged.
//!
//! Uppercasing goes through [`uppercase_object_name`] rather than a bare
//! `to_uppercase`, because dotted-İ input (Turkish deployments are the
//! common case) must land on the plain ASCII `I` the database expects.

use crate::config::DataConfig;
use crate::dialect::Dialect;
use std::sync::Arc;

/// Uppercase an object name, normalizing the dotted capital İ to ASCII I.
///
/// `"İstanbul"` becomes `"ISTANBUL"`, not `"İSTANBUL"`; other characters
/// follow standard Unicode uppercasing (`"sipariş"` → `"SIPARIŞ"`).
pub fn uppercase_object_name(name: &str) -> String {
    name.to_uppercase().replace('İ', "I")
}

/// Resolves logical namespace/table/field names to physical object names.
#[derive(Clone)]
pub struct NameMapper {
    dialect: Dialect,
    config: Arc<DataConfig>,
}

impl NameMapper {
    pub fn new(dialect: Dialect, config: Arc<DataConfig>) -> Self {
        Self { dialect, config }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Map a logical namespace to its physical schema name.
    pub fn map_namespace(&self, raw: &str) -> String {
        let mapped = self
            .config
            .namespace_map
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw);
        self.finish(mapped)
    }

    /// Map a logical type name to its physical table name.
    pub fn map_table(&self, raw: &str) -> String {
        let mapped = self
            .config
            .table_map
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw);
        self.finish(mapped)
    }

    /// Map a logical property name to its physical column name.
    pub fn map_field(&self, raw: &str) -> String {
        let mapped = self
            .config
            .field_map
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw);
        self.finish(mapped)
    }

    /// Truncate to the configured character limit, when positive.
    pub fn check_char_limit<'a>(&self, key: &'a str) -> std::borrow::Cow<'a, str> {
        let limit = self.config.object_name_char_limit;
        if limit > 0 && key.chars().count() > limit {
            key.chars().take(limit).collect::<String>().into()
        } else {
            key.into()
        }
    }

    /// Quote a physical name for the dialect, truncating first.
    pub fn format_data_element(&self, key: &str) -> String {
        self.dialect.quote(&self.check_char_limit(key))
    }

    fn finish(&self, mapped: &str) -> String {
        let cased = if self.config.use_uppercase_object_names {
            uppercase_object_name(mapped)
        } else {
            mapped.to_string()
        };
        self.check_char_limit(&cased).into_owned()
    }
}
