//! The `Scain` facade: one handle over claim codes and event integrity.
//!
//! Everything is wired by explicit dependency passing. The facade owns no
//! global state; two instances over two stores are fully independent.

use std::path::Path;
use std::sync::Arc;

use scain_kernel_anchor::Anchor;
use scain_kernel_core::{canonical_bytes, HashAlgorithm, Value};
use scain_kernel_store::{SqliteStore, Store};

use crate::claims::ClaimCodeLifecycle;
use crate::config::ScainConfig;
use crate::error::Result;
use crate::integrity::EventIntegrityPipeline;

/// The main kernel handle.
///
/// Provides:
/// - Canonical encoding and hashing of values
/// - Claim-code issuance and redemption
/// - Event recording, verification and anchoring
/// - Raw device data ingestion
pub struct Scain {
    claims: ClaimCodeLifecycle,
    events: EventIntegrityPipeline,
    config: ScainConfig,
}

impl Scain {
    /// Create a kernel over `store` without a ledger.
    pub fn new<S: Store + 'static>(store: Arc<S>, config: ScainConfig) -> Self {
        let events = EventIntegrityPipeline::new(store.clone(), &config);
        Self::assemble(store, events, config)
    }

    /// Create a kernel that anchors recorded events to `ledger`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_anchor<S: Store + 'static>(
        store: Arc<S>,
        ledger: Arc<dyn Anchor>,
        config: ScainConfig,
    ) -> Self {
        let events = EventIntegrityPipeline::with_anchor(store.clone(), ledger, &config);
        Self::assemble(store, events, config)
    }

    /// Open a SQLite database at `path` and create a kernel over it.
    pub fn open(path: impl AsRef<Path>, config: ScainConfig) -> Result<Self> {
        let store = SqliteStore::open_with_busy_timeout(path, config.store_timeout)?;
        Ok(Self::new(Arc::new(store), config))
    }

    fn assemble<S: Store + 'static>(store: Arc<S>, events: EventIntegrityPipeline, config: ScainConfig) -> Self {
        let claims = ClaimCodeLifecycle::new(store, config.claims.clone(), config.store_timeout);
        Self {
            claims,
            events,
            config,
        }
    }

    pub fn config(&self) -> &ScainConfig {
        &self.config
    }

    /// Claim-code operations.
    pub fn claims(&self) -> &ClaimCodeLifecycle {
        &self.claims
    }

    /// Event recording, verification and ingestion.
    pub fn events(&self) -> &EventIntegrityPipeline {
        &self.events
    }

    /// Canonical bytes of `value`.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(canonical_bytes(value)?)
    }

    /// Hex digest of `value` under `algorithm`.
    pub fn compute_hash(&self, value: &Value, algorithm: HashAlgorithm) -> Result<String> {
        Ok(self.events.hasher().compute(value, algorithm)?)
    }

    /// Whether `value` hashes to `expected`. Never fails.
    pub fn verify_hash(&self, value: &Value, expected: &str, algorithm: HashAlgorithm) -> bool {
        self.events.hasher().verify(value, expected, algorithm)
    }

    /// Stop background work.
    pub async fn shutdown(&self) {
        self.events.shutdown().await;
    }
}
