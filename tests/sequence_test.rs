//! Sequence allocation, including the create-and-retry-once fallback.

mod common;

use common::memory_connection;
use serde_json::json;
use sqlgate::config::DataConfig;
use sqlgate::dialect::Dialect;
use sqlgate::entity::EntityDescriptor;
use sqlgate::error::Error;

fn order_entity() -> EntityDescriptor {
    EntityDescriptor::new("Shop.Sales", "Order")
}

#[tokio::test]
async fn postgres_sequence_value() {
    let (mut conn, state) = memory_connection(Dialect::PostgreSql, DataConfig::default());
    state
        .lock()
        .unwrap()
        .scalar_responses
        .push_back(Ok(Some(json!(42))));

    let value = conn.sequence_next_value(&order_entity()).await.unwrap();
    assert_eq!(value, 42);

    let state = state.lock().unwrap();
    assert_eq!(state.statements.len(), 1);
    assert!(
        state.statements[0]
            .sql
            .starts_with("SELECT nextval('SEQ_Shop_Sales_Order_")
    );
}

#[tokio::test]
async fn oracle_sequence_query_shape() {
    let (mut conn, state) = memory_connection(Dialect::Oracle, DataConfig::default());
    state
        .lock()
        .unwrap()
        .scalar_responses
        .push_back(Ok(Some(json!(7))));

    let value = conn.sequence_next_value(&order_entity()).await.unwrap();
    assert_eq!(value, 7);

    let state = state.lock().unwrap();
    let scalar = state
        .statements
        .iter()
        .find(|s| s.kind == "scalar")
        .unwrap();
    assert!(scalar.sql.starts_with("SELECT S_"));
    assert!(scalar.sql.ends_with(".nextval FROM DUAL"));
}

#[tokio::test]
async fn auto_increment_dialects_return_zero() {
    for dialect in [Dialect::SqlServer, Dialect::MySql] {
        let (mut conn, state) = memory_connection(dialect, DataConfig::default());
        let value = conn.sequence_next_value(&order_entity()).await.unwrap();
        assert_eq!(value, 0, "{dialect}");
        assert!(state.lock().unwrap().statements.is_empty(), "{dialect}");
    }
}

#[tokio::test]
async fn missing_sequence_created_and_retried_once() {
    let (mut conn, state) = memory_connection(Dialect::PostgreSql, DataConfig::default());
    {
        let mut state = state.lock().unwrap();
        state
            .scalar_responses
            .push_back(Err("relation does not exist".to_string()));
        state.scalar_responses.push_back(Ok(Some(json!(17))));
    }

    let value = conn
        .sequence_next_value_for(&order_entity(), "Id", false)
        .await
        .unwrap();
    assert_eq!(value, 17);

    let state = state.lock().unwrap();
    let creates: Vec<_> = state
        .statements
        .iter()
        .filter(|s| s.sql.contains("CREATE SEQUENCE"))
        .collect();
    assert_eq!(creates.len(), 1);
    assert!(creates[0].sql.contains("SEQ_Shop_Sales_Order_Id"));
}

#[tokio::test]
async fn second_failure_surfaces_sequence_unavailable() {
    let (mut conn, state) = memory_connection(Dialect::PostgreSql, DataConfig::default());
    {
        let mut state = state.lock().unwrap();
        state
            .scalar_responses
            .push_back(Err("relation does not exist".to_string()));
        state
            .scalar_responses
            .push_back(Err("still missing".to_string()));
    }

    let err = conn
        .sequence_next_value_for(&order_entity(), "Id", false)
        .await
        .unwrap_err();

    match &err {
        Error::SequenceUnavailable { sequence, source } => {
            assert_eq!(sequence, "SEQ_Shop_Sales_Order_Id");
            assert!(source.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Exactly one DDL attempt and exactly two lookups.
    let state = state.lock().unwrap();
    let creates = state
        .statements
        .iter()
        .filter(|s| s.sql.contains("CREATE SEQUENCE"))
        .count();
    let lookups = state
        .statements
        .iter()
        .filter(|s| s.sql.contains("nextval"))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(lookups, 2);
}

#[tokio::test]
async fn single_sequence_per_table_delegates_to_type_sequence() {
    let (mut conn, state) = memory_connection(Dialect::PostgreSql, DataConfig::default());
    state
        .lock()
        .unwrap()
        .scalar_responses
        .push_back(Ok(Some(json!(5))));

    let value = conn
        .sequence_next_value_for(&order_entity(), "Id", true)
        .await
        .unwrap();
    assert_eq!(value, 5);

    let state = state.lock().unwrap();
    // Per-type name, not the per-property composite.
    assert!(!state.statements[0].sql.contains("Order_Id"));
}

#[tokio::test]
async fn property_sequence_on_auto_increment_dialect_returns_zero() {
    let (mut conn, state) = memory_connection(Dialect::MySql, DataConfig::default());
    let value = conn
        .sequence_next_value_for(&order_entity(), "Id", false)
        .await
        .unwrap();
    assert_eq!(value, 0);
    assert!(state.lock().unwrap().statements.is_empty());
}
