//! Error types for the data-access core.
//!
//! All errors are defined with `thiserror`. Execution failures are never
//! surfaced bare: every path that touches the native driver re-raises with
//! the executed SQL text attached and the driver error preserved as the
//! source.

use crate::dialect::Dialect;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No driver registered for dialect {dialect}")]
    UnsupportedDialect { dialect: Dialect },

    #[error("A transaction is already active on this connection")]
    TransactionAlreadyActive,

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Execution failed: {message} [{sql}]")]
    Execution {
        message: String,
        /// The statement as sent to the driver, after dialect rewriting.
        sql: String,
        #[source]
        source: Option<DriverError>,
    },

    #[error("Sequence '{sequence}' is unavailable")]
    SequenceUnavailable {
        sequence: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /// Create an execution error carrying the offending SQL.
    pub fn execution(
        message: impl Into<String>,
        sql: impl Into<String>,
        source: Option<DriverError>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            sql: sql.into(),
            source,
        }
    }

    /// Create a sequence-unavailable error.
    pub fn sequence_unavailable(sequence: impl Into<String>, source: Option<Error>) -> Self {
        Self::SequenceUnavailable {
            sequence: sequence.into(),
            source: source.map(Box::new),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this error is worth retrying at the caller's discretion.
    ///
    /// The core itself never retries except the single DDL-fallback pass in
    /// the sequence allocator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// The executed SQL, when this error carries one.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Execution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Opaque failure reported by a native driver adapter.
///
/// Adapters flatten their library-specific errors into a message here; the
/// `Connection` wraps it into [`Error::Execution`] together with the SQL.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<tiberius::error::Error> for DriverError {
    fn from(err: tiberius::error::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type alias for data-access operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias used at the driver boundary.
pub type DriverResult<T> = std::result::Result<T, DriverError>;
