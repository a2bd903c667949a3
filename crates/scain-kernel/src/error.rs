//! Error types for the kernel.

use std::future::Future;
use std::time::Duration;

use scain_kernel_anchor::AnchorError;
use scain_kernel_core::{ClaimError, CoreError, EncodingError, EventId, IngestionId};
use scain_kernel_store::StoreError;
use thiserror::Error;

/// Errors that can occur during kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A value could not be canonically encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Expected claim-code outcome (not found, used, expired, ...).
    #[error("claim error: {0}")]
    Claim(#[from] ClaimError),

    /// Malformed identifier or enum text.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Anchor error.
    #[error("anchor error: {0}")]
    Anchor(#[from] AnchorError),

    /// A store call exceeded its time limit, or SQLite gave up waiting for a
    /// lock. The call may still have taken effect.
    #[error("store call timed out after {0:?}")]
    StoreTimeout(Duration),

    /// Every generated code collided with an existing one.
    #[error("no unused claim code found after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    /// Event not found.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// No raw reading stored under this id.
    #[error("ingestion not found: {0}")]
    IngestionNotFound(IngestionId),

    /// Raw device data could not be transformed.
    #[error("invalid ingest payload: {0}")]
    InvalidIngest(String),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl KernelError {
    /// The claim outcome, if this is one.
    pub fn as_claim(&self) -> Option<&ClaimError> {
        match self {
            KernelError::Claim(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Run a store call under `limit`.
///
/// A lock wait that SQLite abandoned counts as a timeout too: the store's busy
/// timeout is the same limit.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = std::result::Result<T, StoreError>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(Err(e)) if e.is_busy() => {
            tracing::warn!(error = %e, ?limit, "store lock wait abandoned");
            Err(KernelError::StoreTimeout(limit))
        }
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!(?limit, "store call timed out");
            Err(KernelError::StoreTimeout(limit))
        }
    }
}
