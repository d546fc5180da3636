//! MySQL driver adapter.
//!
//! One `sqlx::MySqlConnection`. Named `@pN` placeholders become `?` per
//! occurrence, so a parameter referenced twice is bound twice in occurrence
//! order.

use crate::driver::{
    DriverConnection, DriverRow, IsolationLevel, PlaceholderStyle, RawDecimal, TypeCategory,
    categorize_type, decode_binary_value, rewrite_placeholders,
};
use crate::error::{DriverError, DriverResult};
use crate::params::{BoundParam, ParamValue};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row, TypeInfo};
use tracing::debug;

/// MySQL adapter over a single physical connection.
pub struct MySqlDriver {
    connection_string: String,
    conn: Option<MySqlConnection>,
}

impl MySqlDriver {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            conn: None,
        }
    }

    fn conn_mut(&mut self) -> DriverResult<&mut MySqlConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DriverError::new("connection is not open"))
    }

    fn prepare<'q>(sql: &'q str, params: &'q [BoundParam]) -> (String, Vec<&'q ParamValue>) {
        let (rewritten, order) =
            rewrite_placeholders(sql, '@', params, PlaceholderStyle::Question);
        let values = order.iter().map(|&i| &params[i].value).collect();
        (rewritten, values)
    }
}

#[async_trait]
impl DriverConnection for MySqlDriver {
    async fn open(&mut self) -> DriverResult<()> {
        if self.conn.is_none() {
            let conn = MySqlConnection::connect(&self.connection_string).await?;
            debug!("MySQL connection opened");
            self.conn = Some(conn);
        }
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            debug!("MySQL connection closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    async fn execute(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<u64> {
        let conn = self.conn_mut()?;
        if params.is_empty() {
            // Unprepared path: some statements (transaction control, DDL)
            // do not support prepared execution.
            let result = conn.execute(sql).await?;
            return Ok(result.rows_affected());
        }
        let (rewritten, values) = Self::prepare(sql, params);
        let mut query = sqlx::query(&rewritten);
        for value in values {
            query = bind_value(query, value);
        }
        let result = query.execute(conn).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<Vec<DriverRow>> {
        let conn = self.conn_mut()?;
        let (rewritten, values) = Self::prepare(sql, params);
        let mut query = sqlx::query(&rewritten);
        for value in values {
            query = bind_value(query, value);
        }
        let rows = query.fetch_all(conn).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_scalar(
        &mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> DriverResult<Option<JsonValue>> {
        let conn = self.conn_mut()?;
        let (rewritten, values) = Self::prepare(sql, params);
        let mut query = sqlx::query(&rewritten);
        for value in values {
            query = bind_value(query, value);
        }
        let row = query.fetch_optional(conn).await?;
        Ok(row.as_ref().map(|r| decode_column(r, 0)))
    }

    async fn begin(&mut self, isolation: IsolationLevel) -> DriverResult<()> {
        let conn = self.conn_mut()?;
        let set = format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            isolation.sql_keyword()
        );
        conn.execute(set.as_str()).await?;
        conn.execute("START TRANSACTION").await?;
        Ok(())
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.conn_mut()?.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.conn_mut()?.execute("ROLLBACK").await?;
        Ok(())
    }

    async fn savepoint(&mut self, name: &str) -> DriverResult<()> {
        let sql = format!("SAVEPOINT {name}");
        self.conn_mut()?.execute(sql.as_str()).await?;
        Ok(())
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
    value: &'q ParamValue,
) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
    match value {
        ParamValue::Null => query.bind(None::<String>),
        ParamValue::Bool(v) => query.bind(*v),
        ParamValue::Int(v) => query.bind(*v),
        ParamValue::Float(v) => query.bind(*v),
        ParamValue::String(v) => query.bind(v.as_str()),
        ParamValue::DateTime(v) => query.bind(*v),
        ParamValue::Bytes(v) => query.bind(v.as_slice()),
        ParamValue::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}

fn row_to_json(row: &MySqlRow) -> DriverRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), decode_column(row, idx)))
        .collect()
}

fn decode_column(row: &MySqlRow, idx: usize) -> JsonValue {
    let type_name = row.columns()[idx].type_info().name().to_string();
    match categorize_type(&type_name) {
        TypeCategory::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            _ => JsonValue::Null,
        },
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Binary => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(JsonValue::Null),
        TypeCategory::Json => row
            .try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null),
        TypeCategory::DateTime => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_string()))
            .unwrap_or(JsonValue::Null),
        TypeCategory::Uuid | TypeCategory::Text => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    }
}

fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
    // Try signed widths first, then unsigned.
    if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    JsonValue::Null
}

fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
        return serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string()));
    }
    if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
        return serde_json::Number::from_f64(v as f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string()));
    }
    JsonValue::Null
}
