//! In-memory implementation of the store traits.
//!
//! Primarily for tests. Same semantics as SQLite, no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use scain_kernel_core::{
    AnchorReference, ClaimCode, Code, DeviceId, DeviceType, EventId, EventIntegrityRecord,
    IngestionId, ProcessingStatus, RawIngestion,
};

use crate::error::{Result, StoreError};
use crate::traits::{classify_rejection, ClaimCodeStore, EventStore, InsertResult, RedeemOutcome};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Redemption is a
/// check-and-set under a single write lock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    claim_codes: HashMap<Code, ClaimCode>,
    events: HashMap<EventId, EventIntegrityRecord>,
    ingestions: HashMap<IngestionId, RawIngestion>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimCodeStore for MemoryStore {
    async fn insert_claim_code(&self, claim: &ClaimCode) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.claim_codes.contains_key(&claim.code) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.claim_codes.insert(claim.code.clone(), claim.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_claim_code(&self, code: &Code) -> Result<Option<ClaimCode>> {
        let inner = self.read()?;
        Ok(inner.claim_codes.get(code).cloned())
    }

    async fn redeem_claim_code(
        &self,
        code: &Code,
        requested: DeviceType,
        device_id: &DeviceId,
        now: i64,
    ) -> Result<RedeemOutcome> {
        let mut inner = self.write()?;

        let current = inner.claim_codes.get_mut(code);
        if let Some(rejection) = classify_rejection(current.as_deref(), requested, now) {
            return Ok(RedeemOutcome::Rejected(rejection));
        }

        match current {
            Some(claim) => {
                claim.mark_redeemed(device_id.clone(), now);
                Ok(RedeemOutcome::Redeemed(claim.clone()))
            }
            None => Err(StoreError::InvalidData(format!(
                "claim code {code} vanished during redemption"
            ))),
        }
    }

    async fn list_claim_codes(&self, device_type: Option<DeviceType>) -> Result<Vec<ClaimCode>> {
        let inner = self.read()?;

        let mut codes: Vec<ClaimCode> = inner
            .claim_codes
            .values()
            .filter(|c| device_type.map_or(true, |t| c.device_type == t))
            .cloned()
            .collect();
        codes.sort_by(|a, b| (a.issued_at, &a.code).cmp(&(b.issued_at, &b.code)));
        Ok(codes)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, record: &EventIntegrityRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.events.contains_key(&record.event_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.events.insert(record.event_id, record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<EventIntegrityRecord>> {
        let inner = self.read()?;
        Ok(inner.events.get(id).cloned())
    }

    async fn set_anchor_reference(&self, id: &EventId, reference: &AnchorReference) -> Result<bool> {
        let mut inner = self.write()?;

        match inner.events.get_mut(id) {
            Some(record) if record.anchor_reference.is_none() => {
                record.anchor_reference = Some(reference.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_unanchored_events(&self, limit: usize) -> Result<Vec<EventIntegrityRecord>> {
        let inner = self.read()?;

        let mut pending: Vec<&EventIntegrityRecord> = inner
            .events
            .values()
            .filter(|r| r.anchor_reference.is_none())
            .collect();
        pending.sort_by_key(|r| (r.recorded_at, r.event_id));
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    async fn insert_raw_ingestion(&self, ingestion: &RawIngestion) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.ingestions.contains_key(&ingestion.ingestion_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.ingestions.insert(ingestion.ingestion_id, ingestion.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_raw_ingestion(&self, id: &IngestionId) -> Result<Option<RawIngestion>> {
        let inner = self.read()?;
        Ok(inner.ingestions.get(id).cloned())
    }

    async fn complete_raw_ingestion(
        &self,
        id: &IngestionId,
        status: ProcessingStatus,
        event_ids: &[EventId],
        processed_at: i64,
    ) -> Result<bool> {
        let mut inner = self.write()?;

        match inner.ingestions.get_mut(id) {
            Some(ingestion) if ingestion.is_pending() => {
                ingestion.status = status;
                ingestion.event_ids = event_ids.to_vec();
                ingestion.processed_at = Some(processed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
