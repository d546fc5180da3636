//! SQL statement logging.
//!
//! When `log_sql` is enabled, every execution path creates a [`SqlLog`]
//! record immediately before dispatch and finalizes it in a cleanup path
//! that runs on success and failure alike. The core only creates and
//! finishes records; persistence and formatting belong to the injected
//! [`QueryLogger`] collaborator.

use crate::params::BoundParam;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// One executed statement: SQL text, parameter snapshot and timing.
#[derive(Debug, Clone)]
pub struct SqlLog {
    pub id: Uuid,
    pub sql: String,
    /// Parameter snapshot taken at dispatch time.
    pub params: Vec<BoundParam>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SqlLog {
    /// Create a record and stamp its start time.
    pub fn start(sql: impl Into<String>, params: &[BoundParam]) -> Self {
        Self {
            id: Uuid::new_v4(),
            sql: sql.into(),
            params: params.to_vec(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Stamp the finish time. Idempotent.
    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Elapsed milliseconds, once finished.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Receives finalized statement records.
pub trait QueryLogger: Send + Sync {
    fn log_sql(&self, record: &SqlLog);
}

/// Emits records through `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log_sql(&self, record: &SqlLog) {
        debug!(
            id = %record.id,
            sql = %record.sql,
            params = record.params.len(),
            elapsed_ms = ?record.elapsed_ms(),
            "SQL executed"
        );
    }
}

/// Discards all records; the disabled-logging path.
#[derive(Debug, Default)]
pub struct NullLogger;

impl QueryLogger for NullLogger {
    fn log_sql(&self, _record: &SqlLog) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_log_lifecycle() {
        let params = vec![BoundParam::new("p0", ParamValue::Int(1))];
        let mut log = SqlLog::start("SELECT 1", &params);
        assert!(log.finished_at.is_none());
        assert!(log.elapsed_ms().is_none());

        log.finish();
        assert!(log.finished_at.is_some());
        assert!(log.elapsed_ms().is_some());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut log = SqlLog::start("SELECT 1", &[]);
        log.finish();
        let first = log.finished_at;
        log.finish();
        assert_eq!(log.finished_at, first);
    }

    #[test]
    fn test_snapshot_keeps_params() {
        let params = vec![
            BoundParam::new("p0", ParamValue::Int(7)),
            BoundParam::new("p1", ParamValue::from("x")),
        ];
        let log = SqlLog::start("SELECT [A] FROM [B]", &params);
        assert_eq!(log.params.len(), 2);
        assert_eq!(log.params[0].name, "p0");
    }
}
