//! Ledger abstraction for anchoring event hashes.
//!
//! A ledger records `(event_id, hash)` pairs somewhere independent of the
//! local store. Implementations may talk to a blockchain, a notary service,
//! or anything else. Every call may fail or hang.

use async_trait::async_trait;
use scain_kernel_core::{AnchorReference, EventId};

use crate::error::Result;

/// External ledger the pipeline anchors hashes to.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Anchor: Send + Sync {
    /// Record `hash` for `event_id`, returning the ledger's transaction reference.
    async fn anchor(&self, event_id: &EventId, hash: &str) -> Result<AnchorReference>;

    /// The hash the ledger holds for `event_id`, if any.
    async fn anchored_hash(&self, event_id: &EventId) -> Result<Option<String>>;
}

/// An in-memory ledger for testing.
///
/// Supports failure and latency injection so callers can exercise their
/// retry and timeout paths.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::RwLock;

    use crate::error::AnchorError;

    /// In-memory ledger implementation.
    #[derive(Default)]
    pub struct MemoryLedger {
        entries: RwLock<HashMap<EventId, String>>,
        next_tx: AtomicU64,
        fail_next: AtomicUsize,
        offline: AtomicBool,
        latency: RwLock<Option<Duration>>,
        calls: AtomicUsize,
    }

    impl MemoryLedger {
        /// Create an empty, healthy ledger.
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `n` calls fail with `Unavailable`.
        pub fn fail_next(&self, n: usize) {
            self.fail_next.store(n, Ordering::SeqCst);
        }

        /// Fail every call until switched back.
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Delay every call by `latency`.
        pub async fn set_latency(&self, latency: Option<Duration>) {
            *self.latency.write().await = latency;
        }

        /// Overwrite the anchored hash for an event, as a compromised or
        /// diverging ledger would.
        pub async fn overwrite(&self, event_id: EventId, hash: impl Into<String>) {
            self.entries.write().await.insert(event_id, hash.into());
        }

        /// Number of anchored entries.
        pub async fn len(&self) -> usize {
            self.entries.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.entries.read().await.is_empty()
        }

        /// Total calls received, including failed ones.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn enter(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let latency = *self.latency.read().await;
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            if self.offline.load(Ordering::SeqCst) {
                return Err(AnchorError::Unavailable("ledger offline".into()));
            }

            let injected = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(AnchorError::Unavailable("injected failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Anchor for MemoryLedger {
        async fn anchor(&self, event_id: &EventId, hash: &str) -> Result<AnchorReference> {
            self.enter().await?;

            let mut entries = self.entries.write().await;
            if let Some(existing) = entries.get(event_id) {
                if existing != hash {
                    return Err(AnchorError::Rejected(format!(
                        "event {event_id} already anchored with a different hash"
                    )));
                }
            }
            entries.insert(*event_id, hash.to_string());

            let tx = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AnchorReference::new(format!("mem-tx-{tx}")))
        }

        async fn anchored_hash(&self, event_id: &EventId) -> Result<Option<String>> {
            self.enter().await?;
            Ok(self.entries.read().await.get(event_id).cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLedger;
    use super::*;
    use crate::error::AnchorError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_anchor_and_lookup() {
        let ledger = MemoryLedger::new();
        let id = EventId::from_bytes([1; 16]);

        let reference = ledger.anchor(&id, "abcd").await.unwrap();
        assert_eq!(reference.as_str(), "mem-tx-1");
        assert_eq!(ledger.anchored_hash(&id).await.unwrap().as_deref(), Some("abcd"));
        assert_eq!(ledger.anchored_hash(&EventId::from_bytes([2; 16])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reanchor_same_hash_is_accepted() {
        let ledger = MemoryLedger::new();
        let id = EventId::from_bytes([1; 16]);

        ledger.anchor(&id, "abcd").await.unwrap();
        ledger.anchor(&id, "abcd").await.unwrap();
        assert!(matches!(ledger.anchor(&id, "ffff").await, Err(AnchorError::Rejected(_))));
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let ledger = MemoryLedger::new();
        let id = EventId::from_bytes([1; 16]);

        ledger.fail_next(2);
        assert!(ledger.anchor(&id, "h").await.is_err());
        assert!(ledger.anchor(&id, "h").await.is_err());
        assert!(ledger.anchor(&id, "h").await.is_ok());

        ledger.set_offline(true);
        assert!(matches!(
            ledger.anchored_hash(&id).await,
            Err(AnchorError::Unavailable(_))
        ));
        assert_eq!(ledger.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_injection() {
        let ledger = MemoryLedger::new();
        ledger.set_latency(Some(Duration::from_secs(10))).await;

        let slow = tokio::time::timeout(
            Duration::from_secs(1),
            ledger.anchor(&EventId::from_bytes([1; 16]), "h"),
        )
        .await;
        assert!(slow.is_err());
    }
}
