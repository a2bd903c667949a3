//! Error types for the anchor module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a ledger or the anchor queue.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the submission.
    #[error("ledger rejected submission: {0}")]
    Rejected(String),

    /// A single attempt exceeded its time limit.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The queue is at capacity.
    #[error("anchor queue is full")]
    QueueFull,

    /// The queue worker has shut down.
    #[error("anchor queue is closed")]
    QueueClosed,

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] scain_kernel_store::StoreError),
}

/// Result type for anchor operations.
pub type Result<T> = std::result::Result<T, AnchorError>;
