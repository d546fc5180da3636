//! Shared test double: a scripted in-memory driver.
//!
//! Records every call the connection makes and serves scripted rows,
//! scalars and failures, so dialect rewriting, paging decisions, the
//! transaction state machine and cleanup semantics can be observed without
//! a database server.

use serde_json::Value as JsonValue;
use sqlgate::config::{ConnectionSettings, DataConfig};
use sqlgate::connection::Connection;
use sqlgate::dialect::Dialect;
use sqlgate::driver::{DriverConnection, DriverRow, IsolationLevel};
use sqlgate::error::{DriverError, DriverResult};
use sqlgate::params::BoundParam;
use sqlgate::registry::DriverRegistry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One recorded dispatch.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub kind: &'static str,
    pub sql: String,
    pub params: Vec<BoundParam>,
}

#[derive(Default)]
pub struct DriverState {
    pub open: bool,
    pub open_count: usize,
    pub statements: Vec<Recorded>,
    /// Rows served by `query`.
    pub rows: Vec<DriverRow>,
    /// Scripted `query_scalar` responses, popped per call; when empty the
    /// call returns None.
    pub scalar_responses: VecDeque<Result<Option<JsonValue>, String>>,
    /// Any dispatched SQL containing one of these substrings fails.
    pub fail_on: Vec<String>,
    pub begin_isolations: Vec<IsolationLevel>,
    pub commits: usize,
    pub rollbacks: usize,
    pub savepoints: Vec<String>,
}

impl DriverState {
    pub fn executed_sql(&self) -> Vec<String> {
        self.statements.iter().map(|s| s.sql.clone()).collect()
    }

    fn check_failure(&self, sql: &str) -> DriverResult<()> {
        if self.fail_on.iter().any(|needle| sql.contains(needle)) {
            return Err(DriverError::new("scripted failure"));
        }
        Ok(())
    }
}

pub struct MemoryDriver {
    state: Arc<Mutex<DriverState>>,
}

#[async_trait::async_trait]
impl DriverConnection for MemoryDriver {
    async fn open(&mut self) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            state.open = true;
            state.open_count += 1;
        }
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.state.lock().unwrap().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    async fn execute(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.check_failure(sql)?;
        state.statements.push(Recorded {
            kind: "execute",
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(1)
    }

    async fn query(&mut self, sql: &str, params: &[BoundParam]) -> DriverResult<Vec<DriverRow>> {
        let mut state = self.state.lock().unwrap();
        state.check_failure(sql)?;
        state.statements.push(Recorded {
            kind: "query",
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(state.rows.clone())
    }

    async fn query_scalar(
        &mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> DriverResult<Option<JsonValue>> {
        let mut state = self.state.lock().unwrap();
        state.check_failure(sql)?;
        state.statements.push(Recorded {
            kind: "scalar",
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match state.scalar_responses.pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(DriverError::new(message)),
            None => Ok(None),
        }
    }

    async fn begin(&mut self, isolation: IsolationLevel) -> DriverResult<()> {
        self.state.lock().unwrap().begin_isolations.push(isolation);
        Ok(())
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.state
            .lock()
            .unwrap()
            .savepoints
            .push(name.to_string());
        Ok(())
    }
}

/// Build a connection backed by the in-memory driver plus a handle onto its
/// recorded state.
pub fn memory_connection(
    dialect: Dialect,
    config: DataConfig,
) -> (Connection, Arc<Mutex<DriverState>>) {
    let state = Arc::new(Mutex::new(DriverState::default()));
    let registry = DriverRegistry::new();
    let driver_state = Arc::clone(&state);
    registry.register(dialect, move |_settings| {
        Ok(Box::new(MemoryDriver {
            state: Arc::clone(&driver_state),
        }))
    });
    let settings = ConnectionSettings::new(dialect, "memory://test").unwrap();
    let connection = Connection::new(&registry, settings, config).unwrap();
    (connection, state)
}

/// A result row for scripting the driver.
pub fn row(pairs: &[(&str, JsonValue)]) -> DriverRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
