//! Dialect to driver-factory registry.
//!
//! A process typically builds one registry at startup, registers a factory
//! per dialect it intends to reach and shares the registry across
//! connections. Registration is write-once-read-many: the lock is only
//! contended while the process is wiring itself up.

use crate::config::ConnectionSettings;
use crate::dialect::Dialect;
use crate::driver::DriverConnection;
use crate::driver::mssql::MssqlDriver;
use crate::driver::mysql::MySqlDriver;
use crate::driver::postgres::PostgresDriver;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Produces an unopened driver connection for a settings value.
pub type DriverFactory =
    Arc<dyn Fn(&ConnectionSettings) -> Result<Box<dyn DriverConnection>> + Send + Sync>;

/// Maps each dialect to the factory that constructs its native connection.
#[derive(Default)]
pub struct DriverRegistry {
    factories: RwLock<HashMap<Dialect, DriverFactory>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the bundled drivers registered: PostgreSQL and
    /// MySQL over sqlx, SQL Server over tiberius.
    ///
    /// Oracle has no bundled driver; register a factory for it before
    /// resolving Oracle connections.
    pub fn with_default_drivers() -> Self {
        let registry = Self::new();
        registry.register(Dialect::PostgreSql, |settings| {
            Ok(Box::new(PostgresDriver::new(&settings.connection_string)))
        });
        registry.register(Dialect::MySql, |settings| {
            Ok(Box::new(MySqlDriver::new(&settings.connection_string)))
        });
        registry.register(Dialect::SqlServer, |settings| {
            Ok(Box::new(MssqlDriver::new(&settings.connection_string)))
        });
        registry
    }

    /// Register (or replace) the factory for a dialect.
    pub fn register<F>(&self, dialect: Dialect, factory: F)
    where
        F: Fn(&ConnectionSettings) -> Result<Box<dyn DriverConnection>> + Send + Sync + 'static,
    {
        let mut factories = self.factories.write().expect("registry lock poisoned");
        factories.insert(dialect, Arc::new(factory));
        debug!(dialect = %dialect, "Driver factory registered");
    }

    /// Check whether a factory exists for a dialect.
    pub fn is_registered(&self, dialect: Dialect) -> bool {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .contains_key(&dialect)
    }

    /// Construct a native connection for the settings' dialect.
    pub fn resolve(&self, settings: &ConnectionSettings) -> Result<Box<dyn DriverConnection>> {
        let factory = {
            let factories = self.factories.read().expect("registry lock poisoned");
            factories.get(&settings.dialect).cloned()
        };
        match factory {
            Some(factory) => factory(settings),
            None => Err(Error::UnsupportedDialect {
                dialect: settings.dialect,
            }),
        }
    }
}
