//! Execution primitives built on the connection facade.
//!
//! Each primitive follows the same shape: rewrite the dialect-neutral SQL,
//! bind parameters, open the connection lazily, dispatch, then close again
//! if the connection is in one-shot mode. The SQL log is finalized and the
//! close performed whether the dispatch succeeded or failed.

use crate::connection::Connection;
use crate::error::Result;
use crate::params::{ParamValue, bind_named, bind_positional};
use serde_json::Value as JsonValue;

/// A fetched result window: column names in select order plus rows as JSON
/// maps.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
}

impl DataTable {
    pub(crate) fn from_rows(rows: Vec<serde_json::Map<String, JsonValue>>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at a row/column position, if present.
    pub fn value(&self, row: usize, column: &str) -> Option<&JsonValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

impl Connection {
    /// Execute a statement and return the affected row count.
    ///
    /// Parameters are positional and referenced as `@p0, @p1, …` in the
    /// dialect-neutral SQL.
    pub async fn execute_non_query(
        &mut self,
        sql: &str,
        params: Vec<ParamValue>,
    ) -> Result<u64> {
        let text = self.format_sql(sql);
        let bound = bind_positional(params, self.config());
        self.check_connection().await?;
        let command = self.command(text, bound);
        let result = self.run_non_query(&command).await;
        self.finish_execution().await;
        result
    }

    /// Execute a query and return the first column of the first row.
    pub async fn execute_scalar(
        &mut self,
        sql: &str,
        params: Vec<ParamValue>,
    ) -> Result<Option<JsonValue>> {
        let text = self.format_sql(sql);
        let bound = bind_positional(params, self.config());
        self.check_connection().await?;
        let command = self.command(text, bound);
        let result = self.run_scalar(&command).await;
        self.finish_execution().await;
        result
    }

    /// Execute a scalar query with an explicit ordered list of named
    /// parameters, referenced as `@Name` in the SQL.
    pub async fn execute_command(
        &mut self,
        sql: &str,
        params: &[(&str, ParamValue)],
    ) -> Result<Option<JsonValue>> {
        let text = self.format_sql(sql);
        let bound = bind_named(params, self.config());
        self.check_connection().await?;
        let command = self.command(text, bound);
        let result = self.run_scalar(&command).await;
        self.finish_execution().await;
        result
    }

    /// Fetch a tabular result, optionally windowed to
    /// `[start_record, start_record + max_count)`.
    ///
    /// When the dialect supports server-side paging and the statement is
    /// syntactically safe for it (no existing limiting clause, has an ORDER
    /// BY), an OFFSET/FETCH clause is appended and the backend transmits
    /// only the requested window. Otherwise the window is applied to the
    /// driver's buffered rows. `max_count == 0` disables paging entirely.
    pub async fn get_data(
        &mut self,
        sql: &str,
        start_record: usize,
        max_count: usize,
        params: Vec<ParamValue>,
    ) -> Result<DataTable> {
        let mut text = self.format_sql(sql);
        let db_paged = self.can_apply_db_paging(&text, max_count);
        if db_paged {
            text.push_str(&format!(
                " OFFSET {start_record} ROWS FETCH NEXT {max_count} ROWS ONLY"
            ));
        }
        let bound = bind_positional(params, self.config());
        self.check_connection().await?;
        let command = self.command(text, bound);
        let result = self.run_query(&command).await;
        self.finish_execution().await;

        let rows = result?;
        let rows = if !db_paged && max_count > 0 {
            rows.into_iter()
                .skip(start_record)
                .take(max_count)
                .collect()
        } else {
            rows
        };
        Ok(DataTable::from_rows(rows))
    }

    /// Fetch one page of a result, pages counted from 1.
    pub async fn get_paged_data(
        &mut self,
        sql: &str,
        page: usize,
        page_size: usize,
        params: Vec<ParamValue>,
    ) -> Result<DataTable> {
        let start = page.saturating_sub(1) * page_size;
        self.get_data(sql, start, page_size, params).await
    }

    fn can_apply_db_paging(&self, sql: &str, max_count: usize) -> bool {
        if !self.config().use_db_level_paging
            || max_count == 0
            || !self.dialect().supports_server_side_paging()
        {
            return false;
        }
        let upper = sql.to_uppercase();
        !upper.contains(" TOP ")
            && upper.contains(" ORDER BY ")
            && !upper.contains("ROWS FETCH NEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionSettings, DataConfig};
    use crate::dialect::Dialect;
    use crate::registry::DriverRegistry;

    fn connection(dialect: Dialect) -> Connection {
        let registry = DriverRegistry::with_default_drivers();
        let settings = match dialect {
            Dialect::SqlServer => {
                ConnectionSettings::new(dialect, "Server=localhost;Database=db").unwrap()
            }
            Dialect::PostgreSql => {
                ConnectionSettings::new(dialect, "postgres://localhost/db").unwrap()
            }
            Dialect::MySql => ConnectionSettings::new(dialect, "mysql://localhost/db").unwrap(),
            Dialect::Oracle => unreachable!("no bundled Oracle driver"),
        };
        Connection::new(&registry, settings, DataConfig::default()).unwrap()
    }

    #[test]
    fn test_db_paging_requires_order_by() {
        let conn = connection(Dialect::SqlServer);
        assert!(!conn.can_apply_db_paging("SELECT * FROM [T]", 10));
        assert!(conn.can_apply_db_paging("SELECT * FROM [T] ORDER BY [Id]", 10));
    }

    #[test]
    fn test_db_paging_skips_existing_limits() {
        let conn = connection(Dialect::SqlServer);
        assert!(!conn.can_apply_db_paging("SELECT TOP 5 * FROM [T] ORDER BY [Id]", 10));
        assert!(!conn.can_apply_db_paging(
            "SELECT * FROM [T] ORDER BY [Id] OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY",
            10
        ));
    }

    #[test]
    fn test_db_paging_zero_count_never_pages() {
        let conn = connection(Dialect::SqlServer);
        assert!(!conn.can_apply_db_paging("SELECT * FROM [T] ORDER BY [Id]", 0));
    }

    #[test]
    fn test_db_paging_wrong_dialect() {
        let conn = connection(Dialect::MySql);
        assert!(!conn.can_apply_db_paging("SELECT * FROM `T` ORDER BY `Id`", 10));
    }

    #[test]
    fn test_db_paging_disabled_by_config() {
        let registry = DriverRegistry::with_default_drivers();
        let settings =
            ConnectionSettings::new(Dialect::SqlServer, "Server=localhost;Database=db").unwrap();
        let config = DataConfig {
            use_db_level_paging: false,
            ..DataConfig::default()
        };
        let conn = Connection::new(&registry, settings, config).unwrap();
        assert!(!conn.can_apply_db_paging("SELECT * FROM [T] ORDER BY [Id]", 10));
    }

    #[test]
    fn test_data_table_columns_from_first_row() {
        let mut row = serde_json::Map::new();
        row.insert("Id".to_string(), serde_json::json!(1));
        row.insert("Name".to_string(), serde_json::json!("a"));
        let table = DataTable::from_rows(vec![row]);
        assert_eq!(table.columns, vec!["Id", "Name"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.value(0, "Name"), Some(&serde_json::json!("a")));
    }

    #[test]
    fn test_data_table_empty() {
        let table = DataTable::from_rows(Vec::new());
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
