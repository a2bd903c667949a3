//! A store that answers late.
//!
//! Wraps a [`MemoryStore`] and sleeps around every call, so callers can
//! exercise their store time limits.

use std::time::Duration;

use async_trait::async_trait;
use scain_kernel_core::{
    AnchorReference, ClaimCode, Code, DeviceId, DeviceType, EventId, EventIntegrityRecord,
    IngestionId, ProcessingStatus, RawIngestion,
};
use scain_kernel_store::{ClaimCodeStore, EventStore, InsertResult, MemoryStore, RedeemOutcome, Result};

/// When the delay is taken relative to the wrapped call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lag {
    /// Sleep, then run the call. A caller that gives up first leaves no trace.
    Before,
    /// Run the call, then sleep. The effect lands even if the caller gives up.
    After,
}

/// [`MemoryStore`] with a fixed delay on every call.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    lag: Lag,
}

impl SlowStore {
    pub fn new(delay: Duration, lag: Lag) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            lag,
        }
    }

    /// The wrapped store, for setup and inspection without delay.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    async fn delayed<T>(&self, call: impl std::future::Future<Output = T>) -> T {
        match self.lag {
            Lag::Before => {
                tokio::time::sleep(self.delay).await;
                call.await
            }
            Lag::After => {
                let out = call.await;
                tokio::time::sleep(self.delay).await;
                out
            }
        }
    }
}

#[async_trait]
impl ClaimCodeStore for SlowStore {
    async fn insert_claim_code(&self, claim: &ClaimCode) -> Result<InsertResult> {
        self.delayed(self.inner.insert_claim_code(claim)).await
    }

    async fn get_claim_code(&self, code: &Code) -> Result<Option<ClaimCode>> {
        self.delayed(self.inner.get_claim_code(code)).await
    }

    async fn redeem_claim_code(
        &self,
        code: &Code,
        requested: DeviceType,
        device_id: &DeviceId,
        now: i64,
    ) -> Result<RedeemOutcome> {
        self.delayed(self.inner.redeem_claim_code(code, requested, device_id, now))
            .await
    }

    async fn list_claim_codes(&self, device_type: Option<DeviceType>) -> Result<Vec<ClaimCode>> {
        self.delayed(self.inner.list_claim_codes(device_type)).await
    }
}

#[async_trait]
impl EventStore for SlowStore {
    async fn insert_event(&self, record: &EventIntegrityRecord) -> Result<InsertResult> {
        self.delayed(self.inner.insert_event(record)).await
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<EventIntegrityRecord>> {
        self.delayed(self.inner.get_event(id)).await
    }

    async fn set_anchor_reference(&self, id: &EventId, reference: &AnchorReference) -> Result<bool> {
        self.delayed(self.inner.set_anchor_reference(id, reference)).await
    }

    async fn list_unanchored_events(&self, limit: usize) -> Result<Vec<EventIntegrityRecord>> {
        self.delayed(self.inner.list_unanchored_events(limit)).await
    }

    async fn insert_raw_ingestion(&self, ingestion: &RawIngestion) -> Result<InsertResult> {
        self.delayed(self.inner.insert_raw_ingestion(ingestion)).await
    }

    async fn get_raw_ingestion(&self, id: &IngestionId) -> Result<Option<RawIngestion>> {
        self.delayed(self.inner.get_raw_ingestion(id)).await
    }

    async fn complete_raw_ingestion(
        &self,
        id: &IngestionId,
        status: ProcessingStatus,
        event_ids: &[EventId],
        processed_at: i64,
    ) -> Result<bool> {
        self.delayed(self.inner.complete_raw_ingestion(id, status, event_ids, processed_at))
            .await
    }
}
