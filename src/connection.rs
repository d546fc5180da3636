//! The connection facade.
//!
//! A `Connection` owns exactly one native driver connection, resolved
//! through the [`DriverRegistry`] at construction time, and tracks at most
//! one active transaction. It is single-owner state: all operations take
//! `&mut self`, so one logical caller issues one operation at a time and
//! statements execute strictly in call order.
//!
//! Execution primitives (`execute_non_query`, `execute_scalar`,
//! `get_data`, …) live in the `executor` module; this file holds the
//! connection state machine, transaction lifecycle and dialect-neutral SQL
//! rewriting.

use crate::config::{ConnectionSettings, DataConfig};
use crate::dialect::Dialect;
use crate::driver::{DriverConnection, DriverRow, IsolationLevel};
use crate::error::{Error, Result};
use crate::logging::{NullLogger, QueryLogger, SqlLog, TracingLogger};
use crate::naming::NameMapper;
use crate::params::BoundParam;
use crate::registry::DriverRegistry;
use crate::select::SelectResolver;
use crate::sequence::{DefaultSequenceDesigner, SequenceDesigner};
use crate::transaction::{DEFAULT_TRANSACTION_ISOLATION, TransactionHandle};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One statement ready for dispatch: rewritten SQL, bound parameters and
/// whether it runs inside the connection's current transaction.
#[derive(Debug, Clone)]
pub struct Command {
    pub sql: String,
    pub params: Vec<BoundParam>,
    /// True when a not-yet-finalized transaction was active at creation;
    /// the statement executes within it.
    pub in_transaction: bool,
}

/// The central facade over one native database connection.
pub struct Connection {
    dialect: Dialect,
    settings: ConnectionSettings,
    config: Arc<DataConfig>,
    driver: Box<dyn DriverConnection>,
    logger: Arc<dyn QueryLogger>,
    sequence_designer: Arc<dyn SequenceDesigner>,
    close_after_execution: bool,
    current_transaction: Option<TransactionHandle>,
}

impl Connection {
    /// Build a connection for the settings' dialect.
    ///
    /// The driver is resolved from the registry but not opened; opening
    /// happens lazily on first execution. Dialect-mandated configuration
    /// coercions are applied here (see
    /// [`DataConfig::apply_dialect_defaults`]).
    pub fn new(
        registry: &DriverRegistry,
        settings: ConnectionSettings,
        config: DataConfig,
    ) -> Result<Self> {
        let mut config = config;
        let dialect = settings.dialect;
        config.apply_dialect_defaults(dialect);

        let driver = registry.resolve(&settings)?;
        let logger: Arc<dyn QueryLogger> = if config.log_sql {
            Arc::new(TracingLogger)
        } else {
            Arc::new(NullLogger)
        };

        info!(
            dialect = %dialect,
            database = ?settings.database,
            "Connection created"
        );

        Ok(Self {
            dialect,
            settings,
            config: Arc::new(config),
            driver,
            logger,
            sequence_designer: Arc::new(DefaultSequenceDesigner::new(dialect)),
            close_after_execution: true,
            current_transaction: None,
        })
    }

    /// Replace the SQL-log sink.
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the schema-designer collaborator used for sequence DDL
    /// fallback.
    pub fn with_sequence_designer(mut self, designer: Arc<dyn SequenceDesigner>) -> Self {
        self.sequence_designer = designer;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Name mapper bound to this connection's dialect and configuration.
    pub fn mapper(&self) -> NameMapper {
        NameMapper::new(self.dialect, Arc::clone(&self.config))
    }

    /// Table/field name resolver for query generation.
    pub fn resolver(&self) -> SelectResolver {
        SelectResolver::new(self.mapper())
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_open()
    }

    /// Whether the connection closes itself after each one-shot execution.
    pub fn close_after_execution(&self) -> bool {
        self.close_after_execution
    }

    pub fn set_close_after_execution(&mut self, value: bool) {
        self.close_after_execution = value;
    }

    /// The active transaction, if one has been begun and not yet released.
    pub fn current_transaction(&self) -> Option<&TransactionHandle> {
        self.current_transaction.as_ref()
    }

    /// Open the native connection.
    pub async fn open(&mut self) -> Result<()> {
        self.driver
            .open()
            .await
            .map_err(|e| Error::connection(e.message))
    }

    /// Close the native connection. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        self.driver
            .close()
            .await
            .map_err(|e| Error::connection(e.message))
    }

    /// Begin a transaction at the default isolation policy.
    pub async fn begin_transaction(&mut self) -> Result<&TransactionHandle> {
        self.begin_transaction_with(DEFAULT_TRANSACTION_ISOLATION)
            .await
    }

    /// Begin a transaction.
    ///
    /// The `_requested` level is accepted for interface compatibility but
    /// deliberately not honored: every transaction runs at
    /// [`DEFAULT_TRANSACTION_ISOLATION`]. Inherited behavior, kept explicit
    /// until the policy is revisited.
    pub async fn begin_transaction_with(
        &mut self,
        _requested: IsolationLevel,
    ) -> Result<&TransactionHandle> {
        if self.current_transaction.is_some() {
            return Err(Error::TransactionAlreadyActive);
        }
        self.check_connection().await?;
        // The connection must outlive the transaction.
        self.close_after_execution = false;

        self.driver
            .begin(DEFAULT_TRANSACTION_ISOLATION)
            .await
            .map_err(|e| Error::execution(e.message.clone(), "BEGIN TRANSACTION", Some(e)))?;

        let handle = TransactionHandle::new(DEFAULT_TRANSACTION_ISOLATION);
        info!(transaction_id = %handle.id, "Transaction started");
        Ok(self.current_transaction.insert(handle))
    }

    /// Checkpoint the active transaction and return the savepoint name.
    pub async fn save_transaction(&mut self) -> Result<String> {
        let name = match &self.current_transaction {
            Some(tx) if tx.is_active() => format!("sp{}", tx.savepoint_count() + 1),
            _ => return Err(Error::NoActiveTransaction),
        };
        self.driver
            .savepoint(&name)
            .await
            .map_err(|e| Error::execution(e.message.clone(), format!("SAVEPOINT {name}"), Some(e)))?;
        if let Some(tx) = self.current_transaction.as_mut() {
            tx.mark_saved();
        }
        debug!(savepoint = %name, "Transaction checkpoint");
        Ok(name)
    }

    /// Commit the active transaction.
    pub async fn commit_transaction(&mut self) -> Result<()> {
        self.ensure_active_transaction()?;
        self.driver
            .commit()
            .await
            .map_err(|e| Error::execution(e.message.clone(), "COMMIT", Some(e)))?;
        self.release_current_transaction();
        Ok(())
    }

    /// Roll back the active transaction.
    pub async fn rollback_transaction(&mut self) -> Result<()> {
        self.ensure_active_transaction()?;
        self.driver
            .rollback()
            .await
            .map_err(|e| Error::execution(e.message.clone(), "ROLLBACK", Some(e)))?;
        self.release_current_transaction();
        Ok(())
    }

    fn ensure_active_transaction(&self) -> Result<()> {
        match &self.current_transaction {
            Some(tx) if tx.is_active() => Ok(()),
            _ => Err(Error::NoActiveTransaction),
        }
    }

    fn release_current_transaction(&mut self) {
        if let Some(mut tx) = self.current_transaction.take() {
            tx.mark_released();
            info!(transaction_id = %tx.id, "Transaction released");
        }
        self.close_after_execution = true;
    }

    /// Build a command for this connection, rewriting the SQL into dialect
    /// syntax and attaching the active transaction while it is not yet
    /// finalized.
    pub fn create_command(&self, sql: &str) -> Command {
        self.command(self.format_sql(sql), Vec::new())
    }

    pub(crate) fn command(&self, sql: String, params: Vec<BoundParam>) -> Command {
        Command {
            sql,
            params,
            in_transaction: self
                .current_transaction
                .as_ref()
                .is_some_and(TransactionHandle::is_active),
        }
    }

    /// Rewrite dialect-neutral SQL into this connection's dialect.
    pub fn format_sql(&self, sql: &str) -> String {
        self.dialect.format_sql(sql)
    }

    /// Prefix a bare parameter name with the dialect marker.
    pub fn format_parameter_name(&self, name: &str) -> String {
        format!("{}{}", self.dialect.parameter_marker(), name)
    }

    /// Rewrite the neutral `+` concatenation operator for this dialect.
    pub fn format_string_concat(&self, expression: &str) -> String {
        self.dialect.format_string_concat(expression)
    }

    /// Quote and truncate a physical object name.
    pub fn format_data_element(&self, key: &str) -> String {
        self.mapper().format_data_element(key)
    }

    /// Open the native connection if it is closed.
    ///
    /// On Oracle the session is configured for case-insensitive binary
    /// sorting and linguistic comparison immediately after every open,
    /// with the close-after-execution flag saved and restored around the
    /// setup statements.
    pub(crate) async fn check_connection(&mut self) -> Result<()> {
        if self.driver.is_open() {
            return Ok(());
        }
        self.driver
            .open()
            .await
            .map_err(|e| Error::connection(e.message))?;

        if self.dialect == Dialect::Oracle {
            let saved = self.close_after_execution;
            self.close_after_execution = false;
            let result = self.run_session_setup().await;
            self.close_after_execution = saved;
            result?;
        }
        Ok(())
    }

    async fn run_session_setup(&mut self) -> Result<()> {
        for sql in [
            "ALTER SESSION SET NLS_SORT=BINARY_CI",
            "ALTER SESSION SET NLS_COMP=LINGUISTIC",
        ] {
            let command = self.command(sql.to_string(), Vec::new());
            self.run_non_query(&command).await?;
        }
        Ok(())
    }

    /// Dispatch a non-query statement, logging it when enabled.
    pub(crate) async fn run_non_query(&mut self, command: &Command) -> Result<u64> {
        let mut log = self
            .config
            .log_sql
            .then(|| SqlLog::start(&command.sql, &command.params));
        debug!(
            sql = %command.sql,
            params = command.params.len(),
            in_transaction = command.in_transaction,
            "Executing statement"
        );

        let result = self.driver.execute(&command.sql, &command.params).await;

        if let Some(log) = log.as_mut() {
            log.finish();
            self.logger.log_sql(log);
        }
        result.map_err(|e| Error::execution(e.message.clone(), &command.sql, Some(e)))
    }

    /// Dispatch a query and fetch all rows, logging it when enabled.
    pub(crate) async fn run_query(&mut self, command: &Command) -> Result<Vec<DriverRow>> {
        let mut log = self
            .config
            .log_sql
            .then(|| SqlLog::start(&command.sql, &command.params));
        debug!(
            sql = %command.sql,
            params = command.params.len(),
            in_transaction = command.in_transaction,
            "Executing query"
        );

        let result = self.driver.query(&command.sql, &command.params).await;

        if let Some(log) = log.as_mut() {
            log.finish();
            self.logger.log_sql(log);
        }
        result.map_err(|e| Error::execution(e.message.clone(), &command.sql, Some(e)))
    }

    /// Dispatch a scalar query, logging it when enabled.
    pub(crate) async fn run_scalar(&mut self, command: &Command) -> Result<Option<JsonValue>> {
        let mut log = self
            .config
            .log_sql
            .then(|| SqlLog::start(&command.sql, &command.params));
        debug!(
            sql = %command.sql,
            params = command.params.len(),
            in_transaction = command.in_transaction,
            "Executing scalar query"
        );

        let result = self.driver.query_scalar(&command.sql, &command.params).await;

        if let Some(log) = log.as_mut() {
            log.finish();
            self.logger.log_sql(log);
        }
        result.map_err(|e| Error::execution(e.message.clone(), &command.sql, Some(e)))
    }

    /// Close the connection after a one-shot execution, when configured.
    /// Runs on success and failure paths; close errors are logged, never
    /// allowed to mask the execution result.
    pub(crate) async fn finish_execution(&mut self) {
        if self.close_after_execution {
            if let Err(e) = self.close().await {
                warn!(error = %e, "Failed to close connection after execution");
            }
        }
    }

    pub(crate) fn sequence_designer(&self) -> Arc<dyn SequenceDesigner> {
        Arc::clone(&self.sequence_designer)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("dialect", &self.dialect)
            .field("database", &self.settings.database)
            .field("open", &self.driver.is_open())
            .field("close_after_execution", &self.close_after_execution)
            .field(
                "transaction",
                &self.current_transaction.as_ref().map(|t| t.status),
            )
            .finish_non_exhaustive()
    }
}
