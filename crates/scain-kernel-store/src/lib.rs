//! # SCAIN Kernel Store
//!
//! Storage abstraction for the SCAIN Kernel. Trait-based interfaces for
//! claim-code and event persistence with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ClaimCodeStore`] - Claim-code persistence, including atomic redemption
//! - [`EventStore`] - Event integrity record persistence
//! - [`Store`] - Both of the above behind one handle
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scain_kernel_core::{ClaimCode, Code, DeviceId, DeviceType};
//! use scain_kernel_store::{ClaimCodeStore, RedeemOutcome, SqliteStore};
//!
//! async fn example() -> scain_kernel_store::Result<()> {
//!     let store = SqliteStore::open("scain.db")?;
//!
//!     let code = Code::generate();
//!     store
//!         .insert_claim_code(&ClaimCode::issued(code.clone(), DeviceType::Esp32, 0, None))
//!         .await?;
//!
//!     let outcome = store
//!         .redeem_claim_code(&code, DeviceType::Esp32, &DeviceId::from("esp-1"), 1)
//!         .await?;
//!     assert!(matches!(outcome, RedeemOutcome::Redeemed(_)));
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Insert-if-absent**: inserting an existing key returns `AlreadyExists`
//! - **Atomic redemption**: one conditional transition per call
//! - **Exact payloads**: event payloads are stored as CBOR of the hashed value

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ClaimCodeStore, EventStore, InsertResult, RedeemOutcome, Store};
