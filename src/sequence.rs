//! Sequence-based key allocation.
//!
//! PostgreSQL and Oracle generate primary keys from sequence objects; SQL
//! Server and MySQL rely on auto-increment columns, for which the allocator
//! returns 0 and the caller must pick up the generated key from the insert
//! instead. A missing per-property sequence is created on the fly through
//! the schema-designer collaborator and queried again exactly once.

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::select::SelectResolver;
use serde_json::Value as JsonValue;
use tracing::warn;

/// Oracle caps identifiers at 30 characters; 28 leaves room for the `S_`
/// prefix.
const ORACLE_SEQUENCE_BASE_LIMIT: usize = 28;

/// Boundary to the external schema designer: emits the DDL that creates a
/// missing sequence.
pub trait SequenceDesigner: Send + Sync {
    /// DDL text creating `name`, or None when the dialect has no sequence
    /// objects.
    fn create_sequence(&self, name: &str, is_cyclic: bool) -> Option<String>;
}

/// Designer emitting plain `CREATE SEQUENCE` DDL.
///
/// Identifiers are left unquoted on purpose: the sequence is later queried
/// unquoted, and both spellings must fold the same way.
#[derive(Debug, Clone)]
pub struct DefaultSequenceDesigner {
    dialect: Dialect,
}

impl DefaultSequenceDesigner {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl SequenceDesigner for DefaultSequenceDesigner {
    fn create_sequence(&self, name: &str, is_cyclic: bool) -> Option<String> {
        match self.dialect {
            Dialect::PostgreSql => Some(format!(
                "CREATE SEQUENCE IF NOT EXISTS {name} START WITH 1 INCREMENT BY 1{}",
                if is_cyclic { " CYCLE" } else { "" }
            )),
            Dialect::Oracle => Some(format!(
                "CREATE SEQUENCE {name} MINVALUE 1 START WITH 1 INCREMENT BY 1 CACHE 20 {}",
                if is_cyclic { "CYCLE" } else { "NOCYCLE" }
            )),
            Dialect::SqlServer | Dialect::MySql => None,
        }
    }
}

/// Physical sequence name for an entity and optional property suffix.
///
/// Oracle names are `S_` plus the first 28 characters of the base to stay
/// inside the identifier limit; the other dialects use a `SEQ_` prefix on
/// the full base.
pub fn sequence_name(resolver: &SelectResolver, entity: &EntityDescriptor, suffix: &str) -> String {
    let table = resolver.table_name_unformatted(entity);
    let base = format!("{table}_{suffix}");
    if resolver.dialect() == Dialect::Oracle {
        let clipped: String = base.chars().take(ORACLE_SEQUENCE_BASE_LIMIT).collect();
        format!("S_{clipped}")
    } else {
        format!("SEQ_{base}")
    }
}

impl Connection {
    /// Next value of the entity's table-level sequence.
    ///
    /// Returns 0 on dialects without sequence objects; callers branch on
    /// [`Dialect::supports_sequences`], not on the value.
    pub async fn sequence_next_value(&mut self, entity: &EntityDescriptor) -> Result<i64> {
        if !self.dialect().supports_sequences() {
            return Ok(0);
        }
        let name = sequence_name(&self.resolver(), entity, "");
        self.query_sequence(&name).await
    }

    /// Next value of a per-property sequence, creating it through the
    /// schema designer and retrying exactly once when it does not exist.
    ///
    /// With `single_sequence_per_table` the per-type sequence is used
    /// instead and no creation fallback applies.
    pub async fn sequence_next_value_for(
        &mut self,
        entity: &EntityDescriptor,
        property: &str,
        single_sequence_per_table: bool,
    ) -> Result<i64> {
        if single_sequence_per_table {
            return self.sequence_next_value(entity).await;
        }
        if !self.dialect().supports_sequences() {
            return Ok(0);
        }

        let name = sequence_name(&self.resolver(), entity, property);
        match self.query_sequence(&name).await {
            Ok(value) => Ok(value),
            Err(first) => {
                let Some(ddl) = self.sequence_designer().create_sequence(&name, false) else {
                    return Err(Error::sequence_unavailable(&name, Some(first)));
                };
                warn!(sequence = %name, "Sequence lookup failed, creating and retrying");
                if let Err(create_err) = self.execute_non_query(&ddl, Vec::new()).await {
                    return Err(Error::sequence_unavailable(&name, Some(create_err)));
                }
                self.query_sequence(&name)
                    .await
                    .map_err(|retry_err| Error::sequence_unavailable(&name, Some(retry_err)))
            }
        }
    }

    async fn query_sequence(&mut self, name: &str) -> Result<i64> {
        let sql = match self.dialect() {
            Dialect::PostgreSql => format!("SELECT nextval('{name}')"),
            Dialect::Oracle => format!("SELECT {name}.nextval FROM DUAL"),
            Dialect::SqlServer | Dialect::MySql => return Ok(0),
        };
        let value = self.execute_scalar(&sql, Vec::new()).await?;
        Ok(scalar_to_i64(value))
    }
}

fn scalar_to_i64(value: Option<JsonValue>) -> i64 {
    match value {
        Some(JsonValue::Number(n)) => n.as_i64().unwrap_or(0),
        Some(JsonValue::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::naming::NameMapper;
    use std::sync::Arc;

    fn resolver(dialect: Dialect) -> SelectResolver {
        let mut config = DataConfig::default();
        config.apply_dialect_defaults(dialect);
        SelectResolver::new(NameMapper::new(dialect, Arc::new(config)))
    }

    fn order_entity() -> EntityDescriptor {
        EntityDescriptor::new("Shop.Sales", "Order")
    }

    #[test]
    fn test_sequence_name_postgres() {
        let r = resolver(Dialect::PostgreSql);
        assert_eq!(
            sequence_name(&r, &order_entity(), "Id"),
            "SEQ_Shop_Sales_Order_Id"
        );
    }

    #[test]
    fn test_sequence_name_oracle_prefix_and_clip() {
        let r = resolver(Dialect::Oracle);
        // Oracle coercion uppercases and drops the namespace-as-schema
        // split; the base is clipped to 28 characters.
        let name = sequence_name(&r, &order_entity(), "Id");
        assert!(name.starts_with("S_"));
        assert!(name.chars().count() <= 30);
    }

    #[test]
    fn test_designer_postgres_ddl() {
        let designer = DefaultSequenceDesigner::new(Dialect::PostgreSql);
        let ddl = designer.create_sequence("SEQ_X", false).unwrap();
        assert!(ddl.starts_with("CREATE SEQUENCE IF NOT EXISTS SEQ_X"));
        assert!(!ddl.contains("CYCLE"));
    }

    #[test]
    fn test_designer_oracle_cyclic() {
        let designer = DefaultSequenceDesigner::new(Dialect::Oracle);
        let ddl = designer.create_sequence("S_X", true).unwrap();
        assert!(ddl.contains("CREATE SEQUENCE S_X"));
        assert!(ddl.ends_with("CYCLE"));
    }

    #[test]
    fn test_designer_none_for_auto_increment_dialects() {
        assert!(
            DefaultSequenceDesigner::new(Dialect::SqlServer)
                .create_sequence("SEQ_X", false)
                .is_none()
        );
        assert!(
            DefaultSequenceDesigner::new(Dialect::MySql)
                .create_sequence("SEQ_X", false)
                .is_none()
        );
    }

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(scalar_to_i64(Some(serde_json::json!(42))), 42);
        assert_eq!(scalar_to_i64(Some(serde_json::json!("17"))), 17);
        assert_eq!(scalar_to_i64(Some(serde_json::json!(null))), 0);
        assert_eq!(scalar_to_i64(None), 0);
    }
}
