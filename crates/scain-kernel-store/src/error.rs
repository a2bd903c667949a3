//! Error types for the store module.

use thiserror::Error;

/// Infrastructure failures of a store.
///
/// Expected redemption outcomes are not errors here; they come back as
/// [`RedeemOutcome::Rejected`](crate::RedeemOutcome::Rejected).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored payload could not be written or read back as CBOR.
    #[error("payload serialization error: {0}")]
    Serialization(String),

    /// A row holds a value the domain types reject.
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("migration error: {0}")]
    Migration(String),

    /// A lock holder panicked.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// The blocking task running a query was cancelled or panicked.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// SQLite gave up waiting for a lock held by another connection.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
