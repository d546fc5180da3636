//! SQL Server driver adapter.
//!
//! One `tiberius::Client` over a plain TCP stream. Connection strings use
//! the ADO format (`Server=…;Database=…;User Id=…;Password=…`). Named `@pN`
//! placeholders become the `@P1`-style positional parameters the TDS
//! protocol expects; transaction control goes through `simple_query`.

use crate::driver::{
    DriverConnection, DriverRow, IsolationLevel, PlaceholderStyle, decode_binary_value,
    rewrite_placeholders,
};
use crate::error::{DriverError, DriverResult};
use crate::params::{BoundParam, ParamValue};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tiberius::{Client, ColumnData, Config, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

const PLACEHOLDERS: PlaceholderStyle = PlaceholderStyle::Numbered { prefix: "@P" };

/// SQL Server adapter over a single TDS connection.
pub struct MssqlDriver {
    connection_string: String,
    client: Option<Client<Compat<TcpStream>>>,
}

impl MssqlDriver {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            client: None,
        }
    }

    fn client_mut(&mut self) -> DriverResult<&mut Client<Compat<TcpStream>>> {
        self.client
            .as_mut()
            .ok_or_else(|| DriverError::new("connection is not open"))
    }

    async fn run_simple(&mut self, sql: &str) -> DriverResult<()> {
        let client = self.client_mut()?;
        client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }
}

#[async_trait]
impl DriverConnection for MssqlDriver {
    async fn open(&mut self) -> DriverResult<()> {
        if self.client.is_none() {
            let config = Config::from_ado_string(&self.connection_string)?;
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| DriverError::new(e.to_string()))?;
            tcp.set_nodelay(true).ok();
            let client = Client::connect(config, tcp.compat_write()).await?;
            debug!("SQL Server connection opened");
            self.client = Some(client);
        }
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            debug!("SQL Server connection closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn execute(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<u64> {
        let (rewritten, _) = rewrite_placeholders(sql, '@', params, PLACEHOLDERS);
        let owned: Vec<TdsValue> = params.iter().map(|p| TdsValue::from(&p.value)).collect();
        let refs: Vec<&dyn ToSql> = owned.iter().map(TdsValue::as_to_sql).collect();
        let client = self.client_mut()?;
        let result = client.execute(rewritten, &refs).await?;
        Ok(result.total())
    }

    async fn query(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<Vec<DriverRow>> {
        let (rewritten, _) = rewrite_placeholders(sql, '@', params, PLACEHOLDERS);
        let owned: Vec<TdsValue> = params.iter().map(|p| TdsValue::from(&p.value)).collect();
        let refs: Vec<&dyn ToSql> = owned.iter().map(TdsValue::as_to_sql).collect();
        let client = self.client_mut()?;
        let rows = client
            .query(rewritten, &refs)
            .await?
            .into_first_result()
            .await?;
        Ok(rows.into_iter().map(row_to_json).collect())
    }

    async fn query_scalar(
        &mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> DriverResult<Option<JsonValue>> {
        let rows = self.query(sql, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, value)| value)))
    }

    async fn begin(&mut self, isolation: IsolationLevel) -> DriverResult<()> {
        self.run_simple(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            isolation.sql_keyword()
        ))
        .await?;
        self.run_simple("BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.run_simple("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.run_simple("ROLLBACK TRANSACTION").await
    }

    async fn savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.run_simple(&format!("SAVE TRANSACTION {name}")).await
    }
}

/// Owned parameter storage whose variants all implement `ToSql`.
enum TdsValue {
    Null(Option<i32>),
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(chrono::NaiveDateTime),
    Bytes(Vec<u8>),
}

impl TdsValue {
    fn as_to_sql(&self) -> &dyn ToSql {
        match self {
            Self::Null(v) => v,
            Self::Bool(v) => v,
            Self::Int(v) => v,
            Self::Float(v) => v,
            Self::String(v) => v,
            Self::DateTime(v) => v,
            Self::Bytes(v) => v,
        }
    }
}

impl From<&ParamValue> for TdsValue {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Null => Self::Null(None),
            ParamValue::Bool(v) => Self::Bool(*v),
            ParamValue::Int(v) => Self::Int(*v),
            ParamValue::Float(v) => Self::Float(*v),
            ParamValue::String(v) => Self::String(v.clone()),
            ParamValue::DateTime(v) => Self::DateTime(*v),
            ParamValue::Bytes(v) => Self::Bytes(v.clone()),
            // No native JSON type on this backend, bind as text.
            ParamValue::Json(v) => Self::String(v.to_string()),
        }
    }
}

fn row_to_json(row: tiberius::Row) -> DriverRow {
    let names: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    names
        .into_iter()
        .zip(row.into_iter())
        .map(|(name, data)| (name, column_data_to_json(data)))
        .collect()
}

fn column_data_to_json(data: ColumnData<'static>) -> JsonValue {
    match &data {
        ColumnData::Bit(v) => (*v).map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        ColumnData::U8(v) => (*v)
            .map(|x| JsonValue::Number(x.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::I16(v) => (*v)
            .map(|x| JsonValue::Number(x.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::I32(v) => (*v)
            .map(|x| JsonValue::Number(x.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::I64(v) => (*v)
            .map(|x| JsonValue::Number(x.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::F32(v) => (*v)
            .and_then(|x| serde_json::Number::from_f64(x as f64))
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ColumnData::F64(v) => (*v)
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| JsonValue::String(g.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| decode_binary_value(b))
            .unwrap_or(JsonValue::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| JsonValue::String(n.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| JsonValue::String(x.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            chrono::NaiveDateTime::from_sql(&data)
                .ok()
                .flatten()
                .map(|v| JsonValue::String(v.to_string()))
                .unwrap_or(JsonValue::Null)
        }
        ColumnData::Date(_) => chrono::NaiveDate::from_sql(&data)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Time(_) => chrono::NaiveTime::from_sql(&data)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::DateTimeOffset(_) => chrono::DateTime::<chrono::Utc>::from_sql(&data)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_rfc3339()))
            .unwrap_or(JsonValue::Null),
    }
}
