//! # SCAIN Kernel Testkit
//!
//! Testing utilities for the SCAIN Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known values with their expected canonical bytes and digests
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Stores, ledgers and sample payloads for test scenarios
//! - **Slow store**: A store that answers late, for time-limit tests
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical encoding across implementations:
//!
//! ```rust
//! use scain_kernel_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for vector in all_vectors() {
//!     println!("{}: {}", vector.name, vector.expected_sha256);
//! }
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use scain_kernel_core::canonical_bytes;
//! use scain_kernel_testkit::generators::{shuffled, value};
//!
//! proptest! {
//!     #[test]
//!     fn field_order_does_not_matter(v in value(), seed in any::<u64>()) {
//!         prop_assert_eq!(canonical_bytes(&v).unwrap(), canonical_bytes(&shuffled(&v, seed)).unwrap());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use scain_kernel_testkit::fixtures::{sample_payload_pair, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let (forward, reversed) = sample_payload_pair();
//! assert_ne!(forward, reversed);
//! ```

pub mod fixtures;
pub mod generators;
pub mod slow;
pub mod vectors;

pub use fixtures::{init_tracing, sample_payload_pair, TempDb, TestFixture, T0};
pub use generators::shuffled;
pub use slow::{Lag, SlowStore};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
