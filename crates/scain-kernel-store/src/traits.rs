//! Store traits: the abstract interface for claim-code and event persistence.
//!
//! The kernel is storage-agnostic. Implementations include SQLite (primary)
//! and in-memory (for tests).

use async_trait::async_trait;
use scain_kernel_core::{
    AnchorReference, ClaimCode, ClaimError, Code, DeviceId, DeviceType, EventId,
    EventIntegrityRecord, IngestionId, ProcessingStatus, RawIngestion,
};

use crate::error::Result;

/// Result of an insert-if-absent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// The row was new and has been written.
    Inserted,
    /// A row with the same key already exists. Nothing was written.
    AlreadyExists,
}

/// Result of a conditional redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The code transitioned to `Redeemed`. Carries the updated row.
    Redeemed(ClaimCode),
    /// The transition did not apply. Classified in the order
    /// not found, already used, expired, type mismatch.
    Rejected(ClaimError),
}

/// Persistence for claim codes.
///
/// # Atomicity
///
/// `redeem_claim_code` must be a single atomic check-and-set: among any
/// number of concurrent callers for the same code, at most one observes
/// `Redeemed`.
#[async_trait]
pub trait ClaimCodeStore: Send + Sync {
    /// Insert a freshly issued code unless the code text is already taken.
    async fn insert_claim_code(&self, claim: &ClaimCode) -> Result<InsertResult>;

    /// Look up a code.
    async fn get_claim_code(&self, code: &Code) -> Result<Option<ClaimCode>>;

    /// Transition `Issued -> Redeemed` if the code exists, is unredeemed,
    /// has not expired at `now` and matches `requested`.
    async fn redeem_claim_code(
        &self,
        code: &Code,
        requested: DeviceType,
        device_id: &DeviceId,
        now: i64,
    ) -> Result<RedeemOutcome>;

    /// List codes ordered by issue time, optionally filtered by device type.
    async fn list_claim_codes(&self, device_type: Option<DeviceType>) -> Result<Vec<ClaimCode>>;
}

/// Persistence for event integrity records.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a record unless its id is already present.
    async fn insert_event(&self, record: &EventIntegrityRecord) -> Result<InsertResult>;

    /// Get a record by id.
    async fn get_event(&self, id: &EventId) -> Result<Option<EventIntegrityRecord>>;

    /// Attach an anchor reference to a record that has none yet.
    ///
    /// Returns `false` if the record is missing or already anchored.
    async fn set_anchor_reference(&self, id: &EventId, reference: &AnchorReference) -> Result<bool>;

    /// Oldest records without an anchor reference, up to `limit`.
    async fn list_unanchored_events(&self, limit: usize) -> Result<Vec<EventIntegrityRecord>>;

    /// Store a raw reading as received unless its id is already present.
    async fn insert_raw_ingestion(&self, ingestion: &RawIngestion) -> Result<InsertResult>;

    /// Get a raw reading by id.
    async fn get_raw_ingestion(&self, id: &IngestionId) -> Result<Option<RawIngestion>>;

    /// Move a pending reading to `status`, recording the events made from it.
    ///
    /// Returns `false` if the reading is missing or no longer pending.
    async fn complete_raw_ingestion(
        &self,
        id: &IngestionId,
        status: ProcessingStatus,
        event_ids: &[EventId],
        processed_at: i64,
    ) -> Result<bool>;
}

/// Both persistence surfaces behind one handle.
pub trait Store: ClaimCodeStore + EventStore {}

impl<S: ClaimCodeStore + EventStore + ?Sized> Store for S {}

/// Classify a failed redemption against the current row.
///
/// Shared by every backend so the failure order cannot drift between them.
pub(crate) fn classify_rejection(
    current: Option<&ClaimCode>,
    requested: DeviceType,
    now: i64,
) -> Option<ClaimError> {
    match current {
        None => Some(ClaimError::NotFound),
        Some(claim) => claim.check_redeemable(requested, now).err(),
    }
}
