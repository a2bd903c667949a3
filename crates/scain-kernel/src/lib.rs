//! # SCAIN Kernel
//!
//! Tamper-evident fingerprints for supply-chain events, and one-time claim
//! codes that bind a physical device to its first valid redeemer.
//!
//! ## Overview
//!
//! - **Canonical encoding**: semantically identical payloads always produce
//!   the same bytes, whatever order their fields were built in
//! - **Hashing**: SHA-256 / SHA-512 over the canonical bytes
//! - **Claim codes**: `Issued -> Redeemed` exactly once, atomically in the store
//! - **Event integrity**: record a payload with its hash, verify it later,
//!   optionally against an external ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scain_kernel::{Scain, ScainConfig, Verification};
//! use scain_kernel::core::{DeviceType, Value};
//!
//! async fn example() -> scain_kernel::Result<()> {
//!     let scain = Scain::open("scain.db", ScainConfig::default())?;
//!
//!     // Issue a code and claim a device with it
//!     let codes = scain.claims().issue(DeviceType::Esp32, 1, None).await?;
//!     let device = scain
//!         .claims()
//!         .claim_device(codes[0].code.as_str(), DeviceType::Esp32, 1_700_000_000_000)
//!         .await?;
//!
//!     // Record an event and verify it later
//!     let payload = Value::record().field("device", device.as_str()).field("temp", 4.5).build();
//!     let record = scain.events().record_event(payload).await?;
//!     let outcome = scain.events().verify_event(&record.event_id).await?;
//!     assert_ne!(outcome, Verification::Verified); // no ledger configured
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `scain_kernel::core` - Value model, encoder, hasher, record types
//! - `scain_kernel::store` - Storage traits, SQLite and in-memory stores
//! - `scain_kernel::anchor` - Ledger trait and anchoring queue

pub mod claims;
pub mod config;
pub mod error;
pub mod ingest;
pub mod integrity;
pub mod kernel;

// Re-export component crates
pub use scain_kernel_anchor as anchor;
pub use scain_kernel_core as core;
pub use scain_kernel_store as store;

// Re-export main types for convenience
pub use claims::ClaimCodeLifecycle;
pub use config::{ClaimsConfig, ScainConfig};
pub use error::{KernelError, Result};
pub use ingest::{transform, IngestFailure, IngestReport, RawIngest};
pub use integrity::{EventIntegrityPipeline, TamperReason, Verification};
pub use kernel::Scain;

pub use scain_kernel_anchor::AnchorConfig;
pub use scain_kernel_core::{
    ClaimCode, ClaimError, Code, DeviceId, DeviceType, EventId, EventIntegrityRecord,
    HashAlgorithm, IngestionId, ProcessingStatus, RawIngestion, Value,
};
