//! The native-driver boundary.
//!
//! A [`DriverConnection`] wraps one physical client connection. The core
//! never talks to a client library directly: the `Connection` facade
//! rewrites SQL into dialect syntax, builds the bound-parameter list and
//! delegates here. Adapters for PostgreSQL, MySQL (both sqlx) and SQL
//! Server (tiberius) ship with the crate; anything else is supplied through
//! the driver registry.
//!
//! Rows cross the boundary as JSON maps so the layers above stay free of
//! client-library types.

use crate::error::DriverResult;
use crate::params::BoundParam;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub mod mssql;
pub mod mysql;
pub mod postgres;

/// One result row: column name to decoded value.
pub type DriverRow = serde_json::Map<String, JsonValue>;

/// Transaction isolation, as requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The `SET TRANSACTION ISOLATION LEVEL` keyword form.
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// One physical client connection plus its native transaction, if any.
///
/// Implementations track their own transaction state; `begin`, `commit`,
/// `rollback` and `savepoint` act on the connection's current transaction.
/// `close` must be idempotent. Statements arrive already rewritten into the
/// adapter's dialect; placeholder names follow the `@name`/`:name`
/// convention and are mapped to the client's own placeholder syntax by the
/// adapter (see [`rewrite_placeholders`]).
#[async_trait]
pub trait DriverConnection: Send {
    async fn open(&mut self) -> DriverResult<()>;
    async fn close(&mut self) -> DriverResult<()>;
    fn is_open(&self) -> bool;

    /// Execute a statement and return the affected row count.
    async fn execute(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<u64>;

    /// Fetch all rows of a query.
    async fn query(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<Vec<DriverRow>>;

    /// Fetch the first column of the first row, if any.
    async fn query_scalar(
        &mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> DriverResult<Option<JsonValue>>;

    async fn begin(&mut self, isolation: IsolationLevel) -> DriverResult<()>;
    async fn commit(&mut self) -> DriverResult<()>;
    async fn rollback(&mut self) -> DriverResult<()>;
    async fn savepoint(&mut self, name: &str) -> DriverResult<()>;
}

/// How a client library expects its placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, …` (PostgreSQL) or `@P1, @P2, …` (TDS): one numbered
    /// placeholder per parameter, repeats share the number.
    Numbered { prefix: &'static str },
    /// `?` per occurrence (MySQL): values bound in occurrence order.
    Question,
}

/// Rewrite `@name`/`:name` markers into a client library's placeholder
/// syntax.
///
/// Returns the rewritten SQL plus the bind order: for
/// [`PlaceholderStyle::Question`] the parameter index for each `?` in
/// occurrence order, for [`PlaceholderStyle::Numbered`] each parameter index
/// exactly once. Marker-prefixed tokens that match no parameter name are
/// copied through untouched (e.g. `@@IDENTITY`).
pub fn rewrite_placeholders(
    sql: &str,
    marker: char,
    params: &[BoundParam],
    style: PlaceholderStyle,
) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(sql.len());
    let mut bind_order = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != marker {
            out.push(c);
            continue;
        }
        // Collect the identifier after the marker.
        let mut name = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        match params.iter().position(|p| p.name == name) {
            Some(index) => match style {
                PlaceholderStyle::Numbered { prefix } => {
                    out.push_str(prefix);
                    out.push_str(&(index + 1).to_string());
                }
                PlaceholderStyle::Question => {
                    out.push('?');
                    bind_order.push(index);
                }
            },
            None => {
                out.push(marker);
                out.push_str(&name);
            }
        }
    }

    if let PlaceholderStyle::Numbered { .. } = style {
        bind_order = (0..params.len()).collect();
    }
    (out, bind_order)
}

/// Decode binary column data to JSON: UTF-8 text when it is valid, base64
/// otherwise.
pub(crate) fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Logical category for database column types, shared by the sqlx adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    DateTime,
}

/// Classify a database type name into a logical category.
pub(crate) fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    if lower.contains("timestamp") || lower.contains("datetime") || lower == "date" {
        return TypeCategory::DateTime;
    }
    TypeCategory::Text
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub(crate) struct RawDecimal(pub String);

impl sqlx::Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        use sqlx::TypeInfo;
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl sqlx::Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        use sqlx::TypeInfo;
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}
