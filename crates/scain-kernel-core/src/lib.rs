//! # SCAIN Kernel Core
//!
//! Pure primitives for the SCAIN Kernel: the [`Value`] model, canonical
//! encoding, digests, and the claim-code and event-integrity record types.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! stateless and safe to call from any number of threads.
//!
//! ## Key Types
//!
//! - [`Value`] - Closed tagged union every payload is mapped into
//! - [`CanonicalEncoder`] - Order-independent byte encoding of a [`Value`]
//! - [`Hasher`] - SHA-256 / SHA-512 over the canonical encoding
//! - [`ClaimCode`] - One-time redemption code and its lifecycle state
//! - [`EventIntegrityRecord`] - A payload together with its canonical hash
//! - [`RawIngestion`] - A device reading as received, with its processing status
//!
//! ## Canonicalization
//!
//! ```rust
//! use scain_kernel_core::{canonical_bytes, Value};
//!
//! let a = Value::record().field("b", Value::Integer(2)).field("a", 1).build();
//! let b = Value::record().field("a", 1).field("b", Value::Integer(2)).build();
//!
//! assert_eq!(canonical_bytes(&a).unwrap(), b"{\"a\":1,\"b\":2}".to_vec());
//! assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
//! ```

pub mod canonical;
pub mod claim;
pub mod error;
pub mod event;
pub mod hash;
pub mod ingestion;
pub mod types;
pub mod value;

pub use canonical::{canonical_bytes, CanonicalEncoder};
pub use claim::{ClaimCode, ClaimStatus, Code, DeviceType, CODE_ALPHABET, CODE_LEN};
pub use error::{ClaimError, CoreError, EncodingError};
pub use event::{AnchorReference, EventIntegrityRecord};
pub use hash::{HashAlgorithm, Hasher};
pub use ingestion::{IngestionId, ProcessingStatus, RawIngestion};
pub use types::{DeviceId, EventId};
pub use value::{Field, RecordBuilder, Value};

/// Current time in Unix milliseconds.
///
/// A clock before the epoch is reported as `0`.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
