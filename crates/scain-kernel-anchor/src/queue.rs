//! Background anchoring queue.
//!
//! Recorded events are handed to a single worker task through a bounded
//! channel. The worker submits each hash to the ledger with a per-attempt
//! time limit, retries with linear backoff, and writes the returned reference
//! back to the store under the same limit. Failures never reach the caller
//! that recorded the event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scain_kernel_core::{AnchorReference, EventId};
use scain_kernel_store::EventStore;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{AnchorError, Result};
use crate::ledger::Anchor;

/// Configuration for anchoring behavior.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Time limit for a single ledger call, and for writing its reference back.
    pub attempt_timeout: Duration,
    /// Attempts per job before giving up.
    pub max_attempts: u32,
    /// Base backoff; the wait after attempt `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Jobs buffered before `try_enqueue` reports `QueueFull`.
    pub queue_capacity: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            queue_capacity: 1024,
        }
    }
}

/// A hash waiting to be anchored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorJob {
    pub event_id: EventId,
    pub hash: String,
}

/// Counters describing what the worker has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorStats {
    /// Jobs whose reference was written back to the store.
    pub anchored: u64,
    /// Jobs abandoned after exhausting their attempts.
    pub failed: u64,
    /// Jobs the ledger accepted whose reference could not be written back.
    pub unsaved: u64,
}

#[derive(Default)]
struct Counters {
    anchored: AtomicU64,
    failed: AtomicU64,
    unsaved: AtomicU64,
}

/// Handle to the anchoring worker.
pub struct AnchorQueue {
    sender: mpsc::Sender<AnchorJob>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl AnchorQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(anchor: Arc<dyn Anchor>, store: Arc<dyn EventStore>, config: AnchorConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            anchor,
            store,
            config,
            counters: Arc::clone(&counters),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(worker.run(receiver));

        Self {
            sender,
            shutdown,
            worker: Mutex::new(Some(handle)),
            counters,
        }
    }

    /// Enqueue a job without waiting.
    pub fn try_enqueue(&self, job: AnchorJob) -> Result<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AnchorError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AnchorError::QueueClosed,
        })
    }

    pub fn stats(&self) -> AnchorStats {
        AnchorStats {
            anchored: self.counters.anchored.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            unsaved: self.counters.unsaved.load(Ordering::SeqCst),
        }
    }

    /// Signal the worker to stop and wait for it to exit.
    ///
    /// An in-flight ledger call is allowed to finish; pending retries and
    /// queued jobs are abandoned and stay unanchored in the store.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "anchor worker panicked");
            }
        }
    }
}

struct Worker {
    anchor: Arc<dyn Anchor>,
    store: Arc<dyn EventStore>,
    config: AnchorConfig,
    counters: Arc<Counters>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<AnchorJob>) {
        tracing::debug!("anchor worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let job = tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.process(job).await;
        }

        tracing::debug!("anchor worker stopped");
    }

    async fn process(&mut self, job: AnchorJob) {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.attempt(&job).await {
                Ok(reference) => {
                    self.record(&job, reference).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        event_id = %job.event_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "anchoring attempt failed"
                    );
                }
            }

            if attempt < max_attempts && !self.backoff(attempt).await {
                tracing::debug!(event_id = %job.event_id, "shutdown during backoff");
                return;
            }
        }

        self.counters.failed.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(event_id = %job.event_id, "giving up; event stays unanchored");
    }

    async fn attempt(&self, job: &AnchorJob) -> Result<AnchorReference> {
        let limit = self.config.attempt_timeout;
        match tokio::time::timeout(limit, self.anchor.anchor(&job.event_id, &job.hash)).await {
            Ok(result) => result,
            Err(_) => Err(AnchorError::Timeout(limit)),
        }
    }

    async fn record(&self, job: &AnchorJob, reference: AnchorReference) {
        let limit = self.config.attempt_timeout;
        let write = self.store.set_anchor_reference(&job.event_id, &reference);

        match tokio::time::timeout(limit, write).await {
            Ok(Ok(true)) => {
                self.counters.anchored.fetch_add(1, Ordering::SeqCst);
                tracing::info!(event_id = %job.event_id, reference = %reference, "event anchored");
            }
            Ok(Ok(false)) => {
                tracing::debug!(event_id = %job.event_id, "event already anchored or missing");
            }
            Ok(Err(e)) => {
                self.counters.unsaved.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(event_id = %job.event_id, error = %e, "failed to store anchor reference");
            }
            Err(_) => {
                self.counters.unsaved.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    event_id = %job.event_id,
                    reference = %reference,
                    ?limit,
                    "storing anchor reference timed out"
                );
            }
        }
    }

    /// Wait `attempt * retry_backoff`. Returns `false` if shutdown was
    /// signalled while waiting.
    async fn backoff(&mut self, attempt: u32) -> bool {
        let wait = self.config.retry_backoff.saturating_mul(attempt);
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = self.shutdown.changed() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use scain_kernel_core::{
        EventIntegrityRecord, HashAlgorithm, Hasher, IngestionId, ProcessingStatus, RawIngestion, Value,
    };
    use scain_kernel_store::{InsertResult, MemoryStore, Result as StoreResult};

    fn fast_config() -> AnchorConfig {
        AnchorConfig {
            attempt_timeout: Duration::from_millis(200),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(10),
            queue_capacity: 8,
        }
    }

    async fn stored_event(store: &MemoryStore) -> EventIntegrityRecord {
        let record =
            EventIntegrityRecord::new(&Hasher::new(), Value::from("x"), HashAlgorithm::Sha256, 1).unwrap();
        store.insert_event(&record).await.unwrap();
        record
    }

    fn job(record: &EventIntegrityRecord) -> AnchorJob {
        AnchorJob {
            event_id: record.event_id,
            hash: record.canonical_hash.clone(),
        }
    }

    async fn wait_for(queue: &AnchorQueue, done: impl Fn(AnchorStats) -> bool) -> AnchorStats {
        for _ in 0..500 {
            let stats = queue.stats();
            if done(stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("worker did not finish: {:?}", queue.stats());
    }

    #[tokio::test]
    async fn test_anchors_and_writes_back() {
        let ledger = Arc::new(MemoryLedger::new());
        let store = Arc::new(MemoryStore::new());
        let queue = AnchorQueue::spawn(ledger.clone(), store.clone(), fast_config());

        let record = stored_event(&store).await;
        queue.try_enqueue(job(&record)).unwrap();
        wait_for(&queue, |s| s.anchored == 1).await;

        let stored = store.get_event(&record.event_id).await.unwrap().unwrap();
        assert!(stored.anchor_reference.is_some());
        assert_eq!(
            ledger.anchored_hash(&record.event_id).await.unwrap(),
            Some(record.canonical_hash.clone())
        );
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.fail_next(2);
        let store = Arc::new(MemoryStore::new());
        let queue = AnchorQueue::spawn(ledger.clone(), store.clone(), fast_config());

        let record = stored_event(&store).await;
        queue.try_enqueue(job(&record)).unwrap();
        wait_for(&queue, |s| s.anchored == 1).await;

        assert_eq!(ledger.calls(), 3);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_offline(true);
        let store = Arc::new(MemoryStore::new());
        let queue = AnchorQueue::spawn(ledger.clone(), store.clone(), fast_config());

        let record = stored_event(&store).await;
        queue.try_enqueue(job(&record)).unwrap();
        let stats = wait_for(&queue, |s| s.failed == 1).await;

        assert_eq!(stats.anchored, 0);
        assert_eq!(ledger.calls(), 3);
        let stored = store.get_event(&record.event_id).await.unwrap().unwrap();
        assert!(stored.anchor_reference.is_none());
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_ledger_times_out() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_latency(Some(Duration::from_secs(5))).await;
        let store = Arc::new(MemoryStore::new());
        let config = AnchorConfig {
            attempt_timeout: Duration::from_millis(20),
            max_attempts: 2,
            ..fast_config()
        };
        let queue = AnchorQueue::spawn(ledger.clone(), store.clone(), config);

        let record = stored_event(&store).await;
        queue.try_enqueue(job(&record)).unwrap();
        wait_for(&queue, |s| s.failed == 1).await;

        assert!(store.list_unanchored_events(10).await.unwrap().len() == 1);
        queue.shutdown().await;
    }

    /// Event store whose anchor write-back never finishes.
    struct StuckWriteBack(MemoryStore);

    #[async_trait::async_trait]
    impl EventStore for StuckWriteBack {
        async fn insert_event(&self, record: &EventIntegrityRecord) -> StoreResult<InsertResult> {
            self.0.insert_event(record).await
        }

        async fn get_event(&self, id: &EventId) -> StoreResult<Option<EventIntegrityRecord>> {
            self.0.get_event(id).await
        }

        async fn set_anchor_reference(&self, _: &EventId, _: &AnchorReference) -> StoreResult<bool> {
            std::future::pending().await
        }

        async fn list_unanchored_events(&self, limit: usize) -> StoreResult<Vec<EventIntegrityRecord>> {
            self.0.list_unanchored_events(limit).await
        }

        async fn insert_raw_ingestion(&self, ingestion: &RawIngestion) -> StoreResult<InsertResult> {
            self.0.insert_raw_ingestion(ingestion).await
        }

        async fn get_raw_ingestion(&self, id: &IngestionId) -> StoreResult<Option<RawIngestion>> {
            self.0.get_raw_ingestion(id).await
        }

        async fn complete_raw_ingestion(
            &self,
            id: &IngestionId,
            status: ProcessingStatus,
            event_ids: &[EventId],
            processed_at: i64,
        ) -> StoreResult<bool> {
            self.0.complete_raw_ingestion(id, status, event_ids, processed_at).await
        }
    }

    #[tokio::test]
    async fn test_stuck_write_back_does_not_stall_worker() {
        let ledger = Arc::new(MemoryLedger::new());
        let memory = MemoryStore::new();
        let first = stored_event(&memory).await;
        let second = stored_event(&memory).await;
        let store = Arc::new(StuckWriteBack(memory));
        let config = AnchorConfig {
            attempt_timeout: Duration::from_millis(30),
            ..fast_config()
        };
        let queue = AnchorQueue::spawn(ledger.clone(), store.clone(), config);

        queue.try_enqueue(job(&first)).unwrap();
        queue.try_enqueue(job(&second)).unwrap();
        let stats = wait_for(&queue, |s| s.unsaved == 2).await;

        assert_eq!(stats.anchored, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(ledger.len().await, 2);
        assert!(store.get_event(&second.event_id).await.unwrap().unwrap().anchor_reference.is_none());
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_and_closed_queue() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_latency(Some(Duration::from_secs(5))).await;
        let store = Arc::new(MemoryStore::new());
        let config = AnchorConfig {
            queue_capacity: 1,
            ..fast_config()
        };
        let queue = AnchorQueue::spawn(ledger, store.clone(), config);
        let record = stored_event(&store).await;

        // First job is taken by the worker, second fills the buffer
        queue.try_enqueue(job(&record)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.try_enqueue(job(&record)).unwrap();
        assert!(matches!(queue.try_enqueue(job(&record)), Err(AnchorError::QueueFull)));

        queue.shutdown().await;
        assert!(matches!(queue.try_enqueue(job(&record)), Err(AnchorError::QueueClosed)));
    }
}
