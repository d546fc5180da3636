//! Transaction lifecycle tracking.
//!
//! A [`TransactionHandle`] mirrors the state of the native transaction the
//! driver holds: Created by `begin_transaction`, Saved after a savepoint
//! checkpoint, Released on commit or rollback. The owning `Connection`
//! clears its handle slot on release and restores close-after-execution
//! semantics.

use crate::driver::IsolationLevel;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The isolation level actually requested from every backend.
///
/// The observed production behavior ignores the caller-supplied level and
/// always asks for READ UNCOMMITTED; preserved here as an explicit policy
/// rather than silently honoring the parameter. Likely a latent defect to
/// resolve with the original stakeholders before changing.
pub const DEFAULT_TRANSACTION_ISOLATION: IsolationLevel = IsolationLevel::ReadUncommitted;

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Open, no checkpoint taken yet.
    Created,
    /// Open with at least one savepoint.
    Saved,
    /// Finalized by commit or rollback.
    Released,
}

/// State of the one transaction a connection may hold.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    pub id: Uuid,
    pub status: TransactionStatus,
    /// What was requested from the backend, not what the caller asked for.
    pub isolation: IsolationLevel,
    pub started_at: DateTime<Utc>,
    savepoints: u32,
}

impl TransactionHandle {
    pub fn new(isolation: IsolationLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TransactionStatus::Created,
            isolation,
            started_at: Utc::now(),
            savepoints: 0,
        }
    }

    /// Whether commands may still attach to this transaction.
    pub fn is_active(&self) -> bool {
        !self.is_finalized()
    }

    /// Whether the transaction has been committed or rolled back.
    pub fn is_finalized(&self) -> bool {
        self.status == TransactionStatus::Released
    }

    /// Record a checkpoint and return the generated savepoint name.
    pub fn mark_saved(&mut self) -> String {
        self.savepoints += 1;
        self.status = TransactionStatus::Saved;
        format!("sp{}", self.savepoints)
    }

    pub fn mark_released(&mut self) {
        self.status = TransactionStatus::Released;
    }

    pub fn savepoint_count(&self) -> u32 {
        self.savepoints
    }
}
