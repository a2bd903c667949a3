//! Event integrity pipeline: record, anchor, verify.
//!
//! Local durability is authoritative. Anchoring is advisory: it runs on a
//! background queue, and its failures are logged, never returned.

use std::sync::Arc;
use std::time::Duration;

use scain_kernel_anchor::{Anchor, AnchorJob, AnchorQueue, AnchorStats};
use scain_kernel_core::{now_millis, EventId, EventIntegrityRecord, HashAlgorithm, Hasher, Value};
use scain_kernel_store::{EventStore, InsertResult};

use crate::config::ScainConfig;
use crate::error::{bounded, KernelError, Result};

/// Why a record failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TamperReason {
    /// The stored payload no longer hashes to the stored hash.
    LocalHashMismatch,
    /// The ledger holds a different hash than the local store.
    AnchorMismatch,
}

/// Outcome of [`EventIntegrityPipeline::verify_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Local hash matches, and so does the anchored one.
    Verified,
    /// Local data was modified or the ledger disagrees.
    Tampered { reason: TamperReason },
    /// Local hash matches; no anchored hash could be compared.
    AnchorUnavailable,
}

struct Anchoring {
    ledger: Arc<dyn Anchor>,
    queue: AnchorQueue,
    attempt_timeout: Duration,
}

/// Records payloads with their canonical hash and verifies them later.
pub struct EventIntegrityPipeline {
    store: Arc<dyn EventStore>,
    hasher: Hasher,
    algorithm: HashAlgorithm,
    store_timeout: Duration,
    anchoring: Option<Anchoring>,
}

impl EventIntegrityPipeline {
    /// A pipeline without a ledger. Verification stops at the local check.
    pub fn new(store: Arc<dyn EventStore>, config: &ScainConfig) -> Self {
        Self {
            store,
            hasher: Hasher::new(),
            algorithm: config.hash_algorithm,
            store_timeout: config.store_timeout,
            anchoring: None,
        }
    }

    /// A pipeline that anchors every recorded event to `ledger`.
    ///
    /// Spawns the anchoring worker, so it must be called inside a tokio runtime.
    pub fn with_anchor(store: Arc<dyn EventStore>, ledger: Arc<dyn Anchor>, config: &ScainConfig) -> Self {
        let queue = AnchorQueue::spawn(Arc::clone(&ledger), Arc::clone(&store), config.anchor.clone());
        let mut pipeline = Self::new(store, config);
        pipeline.anchoring = Some(Anchoring {
            ledger,
            queue,
            attempt_timeout: config.anchor.attempt_timeout,
        });
        pipeline
    }

    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash, persist, and queue `payload` for anchoring.
    pub async fn record_event(&self, payload: Value) -> Result<EventIntegrityRecord> {
        self.record_event_at(payload, now_millis()).await
    }

    /// [`record_event`](Self::record_event) with an explicit clock.
    pub async fn record_event_at(&self, payload: Value, now: i64) -> Result<EventIntegrityRecord> {
        let record = EventIntegrityRecord::new(&self.hasher, payload, self.algorithm, now)?;

        match bounded(self.store_timeout, self.store.insert_event(&record)).await? {
            InsertResult::Inserted => {}
            InsertResult::AlreadyExists => {
                return Err(KernelError::InvalidOperation(format!(
                    "event id {} already in use",
                    record.event_id
                )));
            }
        }

        tracing::debug!(
            event_id = %record.event_id,
            hash = %record.canonical_hash,
            algorithm = %record.algorithm,
            "event recorded"
        );

        self.enqueue(&record);
        Ok(record)
    }

    fn enqueue(&self, record: &EventIntegrityRecord) {
        let Some(anchoring) = &self.anchoring else {
            return;
        };

        let job = AnchorJob {
            event_id: record.event_id,
            hash: record.canonical_hash.clone(),
        };
        if let Err(e) = anchoring.queue.try_enqueue(job) {
            tracing::warn!(event_id = %record.event_id, error = %e, "anchoring skipped");
        }
    }

    /// Fetch a stored event by id.
    pub async fn get_event(&self, event_id: &EventId) -> Result<EventIntegrityRecord> {
        bounded(self.store_timeout, self.store.get_event(event_id))
            .await?
            .ok_or(KernelError::EventNotFound(*event_id))
    }

    pub(crate) fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    pub(crate) fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Check a stored event against its own hash and, if anchored, the ledger.
    pub async fn verify_event(&self, event_id: &EventId) -> Result<Verification> {
        let record = self.get_event(event_id).await?;

        if !record.is_intact(&self.hasher) {
            tracing::error!(
                event_id = %event_id,
                stored_hash = %record.canonical_hash,
                "stored payload does not match its hash"
            );
            return Ok(Verification::Tampered {
                reason: TamperReason::LocalHashMismatch,
            });
        }

        let (Some(anchoring), Some(reference)) = (&self.anchoring, &record.anchor_reference) else {
            return Ok(Verification::AnchorUnavailable);
        };

        let lookup = tokio::time::timeout(
            anchoring.attempt_timeout,
            anchoring.ledger.anchored_hash(event_id),
        )
        .await;

        let anchored = match lookup {
            Ok(Ok(Some(hash))) => hash,
            Ok(Ok(None)) => {
                tracing::warn!(event_id = %event_id, reference = %reference, "ledger has no entry for anchored event");
                return Ok(Verification::AnchorUnavailable);
            }
            Ok(Err(e)) => {
                tracing::warn!(event_id = %event_id, error = %e, "ledger lookup failed");
                return Ok(Verification::AnchorUnavailable);
            }
            Err(_) => {
                tracing::warn!(event_id = %event_id, "ledger lookup timed out");
                return Ok(Verification::AnchorUnavailable);
            }
        };

        if anchored.eq_ignore_ascii_case(&record.canonical_hash) {
            Ok(Verification::Verified)
        } else {
            tracing::error!(
                event_id = %event_id,
                reference = %reference,
                stored_hash = %record.canonical_hash,
                anchored_hash = %anchored,
                "anchored hash differs from local hash"
            );
            Ok(Verification::Tampered {
                reason: TamperReason::AnchorMismatch,
            })
        }
    }

    /// Re-queue up to `limit` stored events that have no anchor reference.
    ///
    /// Returns how many were queued. Without a ledger this is a no-op.
    pub async fn reanchor_pending(&self, limit: usize) -> Result<usize> {
        let Some(anchoring) = &self.anchoring else {
            return Ok(0);
        };

        let pending = bounded(self.store_timeout, self.store.list_unanchored_events(limit)).await?;

        let mut queued = 0;
        for record in pending {
            let job = AnchorJob {
                event_id: record.event_id,
                hash: record.canonical_hash,
            };
            match anchoring.queue.try_enqueue(job) {
                Ok(()) => queued += 1,
                Err(e) => {
                    tracing::warn!(error = %e, queued, "stopped re-queuing unanchored events");
                    break;
                }
            }
        }

        tracing::info!(queued, "re-queued unanchored events");
        Ok(queued)
    }

    /// Counters from the anchoring worker, if one is running.
    pub fn anchor_stats(&self) -> Option<AnchorStats> {
        self.anchoring.as_ref().map(|a| a.queue.stats())
    }

    /// Stop the anchoring worker.
    pub async fn shutdown(&self) {
        if let Some(anchoring) = &self.anchoring {
            anchoring.queue.shutdown().await;
        }
    }
}
