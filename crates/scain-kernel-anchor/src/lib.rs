//! # SCAIN Kernel Anchor
//!
//! Anchoring of event hashes to an external ledger.
//!
//! ## Overview
//!
//! Local verification never depends on a ledger. Anchoring adds a second,
//! independent copy of each hash so that tampering with the local store can
//! be detected even if the attacker also rewrote the stored hash.
//!
//! ## Key Properties
//!
//! - **Unreliable by contract**: every ledger call may fail or hang
//! - **Bounded**: jobs wait in a fixed-capacity channel; a full queue is
//!   reported to the producer instead of blocking it
//! - **Time-limited**: every attempt runs under a timeout, retried with
//!   linear backoff
//! - **Cancellable**: the worker observes a shutdown signal while waiting
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scain_kernel_anchor::{AnchorConfig, AnchorJob, AnchorQueue, MemoryLedger};
//! use scain_kernel_core::EventId;
//! use scain_kernel_store::MemoryStore;
//!
//! async fn example() {
//!     let ledger = Arc::new(MemoryLedger::new());
//!     let store = Arc::new(MemoryStore::new());
//!     let queue = AnchorQueue::spawn(ledger, store, AnchorConfig::default());
//!
//!     let _ = queue.try_enqueue(AnchorJob {
//!         event_id: EventId::generate(),
//!         hash: "00".repeat(32),
//!     });
//!     queue.shutdown().await;
//! }
//! ```

pub mod error;
pub mod ledger;
pub mod queue;

pub use error::{AnchorError, Result};
pub use ledger::{memory::MemoryLedger, Anchor};
pub use queue::{AnchorConfig, AnchorJob, AnchorQueue, AnchorStats};
