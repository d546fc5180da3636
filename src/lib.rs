//! sqlgate
//!
//! A uniform data-access core over four SQL dialects: SQL Server,
//! PostgreSQL, Oracle and MySQL. One [`Connection`] facade owns a single
//! native driver connection and hides identifier quoting, parameter
//! markers, server-side paging, sequence-based key generation and
//! transaction handling behind one execution API. Query builders and
//! mapping layers above it emit dialect-neutral SQL with `[bracketed]`
//! identifiers and `@pN` markers.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod entity;
pub mod error;
pub mod executor;
pub mod logging;
pub mod naming;
pub mod params;
pub mod registry;
pub mod select;
pub mod sequence;
pub mod transaction;

pub use config::{ConnectionSettings, DataConfig};
pub use connection::{Command, Connection};
pub use dialect::Dialect;
pub use driver::{DriverConnection, DriverRow, IsolationLevel};
pub use entity::{EntityDescriptor, PropertyDescriptor, PropertyKind};
pub use error::{DriverError, Error, Result};
pub use executor::DataTable;
pub use logging::{QueryLogger, SqlLog};
pub use naming::NameMapper;
pub use params::ParamValue;
pub use registry::{DriverFactory, DriverRegistry};
pub use select::{SelectResolver, TableRef};
pub use sequence::{DefaultSequenceDesigner, SequenceDesigner, sequence_name};
pub use transaction::{DEFAULT_TRANSACTION_ISOLATION, TransactionHandle, TransactionStatus};
