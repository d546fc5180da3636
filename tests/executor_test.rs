//! Execution primitives: cleanup semantics, logging, parameter handling and
//! error enrichment.

mod common;

use chrono::NaiveDate;
use common::memory_connection;
use sqlgate::config::DataConfig;
use sqlgate::dialect::Dialect;
use sqlgate::error::Error;
use sqlgate::logging::{QueryLogger, SqlLog};
use sqlgate::params::ParamValue;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn connection_closed_after_one_shot_execution() {
    let (mut conn, state) = memory_connection(Dialect::MySql, DataConfig::default());
    assert!(conn.close_after_execution());

    conn.execute_non_query("DELETE FROM [T]", Vec::new())
        .await
        .unwrap();

    assert!(!conn.is_open());
    let state = state.lock().unwrap();
    assert_eq!(state.open_count, 1);
    assert!(!state.open);
}

#[tokio::test]
async fn connection_stays_open_when_flag_cleared() {
    let (mut conn, _) = memory_connection(Dialect::MySql, DataConfig::default());
    conn.set_close_after_execution(false);

    conn.execute_non_query("DELETE FROM [T]", Vec::new())
        .await
        .unwrap();

    assert!(conn.is_open());
}

#[tokio::test]
async fn lazy_open_reuses_open_connection() {
    let (mut conn, state) = memory_connection(Dialect::MySql, DataConfig::default());
    conn.set_close_after_execution(false);

    conn.execute_non_query("DELETE FROM [T]", Vec::new())
        .await
        .unwrap();
    conn.execute_scalar("SELECT COUNT(*) FROM [T]", Vec::new())
        .await
        .unwrap();

    assert_eq!(state.lock().unwrap().open_count, 1);
}

#[tokio::test]
async fn execution_error_carries_sql_and_closes_connection() {
    let (mut conn, state) = memory_connection(Dialect::MySql, DataConfig::default());
    state
        .lock()
        .unwrap()
        .fail_on
        .push("BROKEN".to_string());

    let err = conn
        .execute_non_query("UPDATE [BROKEN] SET [A]=@p0", vec![ParamValue::Int(1)])
        .await
        .unwrap_err();

    match &err {
        Error::Execution { sql, source, .. } => {
            assert_eq!(sql, "UPDATE `BROKEN` SET `A`=@p0");
            assert!(source.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Cleanup ran despite the failure.
    assert!(!conn.is_open());
}

#[tokio::test]
async fn named_parameters_bound_in_declared_order() {
    let (mut conn, state) = memory_connection(Dialect::SqlServer, DataConfig::default());

    conn.execute_command(
        "UPDATE [T] SET [Name]=@Name WHERE [Id]=@Id",
        &[
            ("Name", ParamValue::from("alpha")),
            ("Id", ParamValue::Int(3)),
        ],
    )
    .await
    .unwrap();

    let state = state.lock().unwrap();
    let recorded = &state.statements[0];
    assert_eq!(recorded.params[0].name, "Name");
    assert_eq!(recorded.params[1].name, "Id");
    assert_eq!(recorded.sql, "UPDATE [T] SET [Name]=@Name WHERE [Id]=@Id");
}

#[tokio::test]
async fn datetime_parameters_clamped_to_bounds() {
    let (mut conn, state) = memory_connection(Dialect::SqlServer, DataConfig::default());
    let ancient = NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    conn.execute_non_query(
        "UPDATE [T] SET [At]=@p0",
        vec![ParamValue::DateTime(ancient)],
    )
    .await
    .unwrap();

    let state = state.lock().unwrap();
    let min = DataConfig::default().min_date_time;
    assert_eq!(
        state.statements[0].params[0].value,
        ParamValue::DateTime(min)
    );
}

#[tokio::test]
async fn string_formatter_applied_to_parameters() {
    let config = DataConfig {
        string_parameter_formatter: Some(Arc::new(|s: &str| s.trim().to_string())),
        ..DataConfig::default()
    };
    let (mut conn, state) = memory_connection(Dialect::MySql, config);

    conn.execute_non_query(
        "UPDATE [T] SET [Name]=@p0",
        vec![ParamValue::from("  padded  ")],
    )
    .await
    .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(
        state.statements[0].params[0].value,
        ParamValue::from("padded")
    );
}

#[derive(Default)]
struct CaptureLogger {
    records: Mutex<Vec<SqlLog>>,
}

impl QueryLogger for CaptureLogger {
    fn log_sql(&self, record: &SqlLog) {
        self.records.lock().unwrap().push(record.clone());
    }
}

#[tokio::test]
async fn sql_log_records_created_and_finished() {
    let config = DataConfig {
        log_sql: true,
        ..DataConfig::default()
    };
    let logger = Arc::new(CaptureLogger::default());
    let (conn, _) = memory_connection(Dialect::MySql, config);
    let mut conn = conn.with_logger(logger.clone());

    conn.execute_non_query("DELETE FROM [T] WHERE [Id]=@p0", vec![ParamValue::Int(9)])
        .await
        .unwrap();

    let records = logger.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sql, "DELETE FROM `T` WHERE `Id`=@p0");
    assert_eq!(records[0].params.len(), 1);
    assert!(records[0].finished_at.is_some());
    assert!(records[0].elapsed_ms().is_some());
}

#[tokio::test]
async fn sql_log_finished_on_failure_too() {
    let config = DataConfig {
        log_sql: true,
        ..DataConfig::default()
    };
    let logger = Arc::new(CaptureLogger::default());
    let (conn, state) = memory_connection(Dialect::MySql, config);
    let mut conn = conn.with_logger(logger.clone());
    state.lock().unwrap().fail_on.push("BROKEN".to_string());

    let _ = conn
        .execute_non_query("DELETE FROM [BROKEN]", Vec::new())
        .await
        .unwrap_err();

    let records = logger.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].finished_at.is_some());
}

#[tokio::test]
async fn logging_disabled_produces_no_records() {
    let logger = Arc::new(CaptureLogger::default());
    let (conn, _) = memory_connection(Dialect::MySql, DataConfig::default());
    let mut conn = conn.with_logger(logger.clone());

    conn.execute_non_query("DELETE FROM [T]", Vec::new())
        .await
        .unwrap();

    assert!(logger.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn scalar_returns_first_scripted_value() {
    let (mut conn, state) = memory_connection(Dialect::MySql, DataConfig::default());
    state
        .lock()
        .unwrap()
        .scalar_responses
        .push_back(Ok(Some(serde_json::json!(99))));

    let value = conn
        .execute_scalar("SELECT MAX([Id]) FROM [T]", Vec::new())
        .await
        .unwrap();
    assert_eq!(value, Some(serde_json::json!(99)));
}
