//! SQLite implementation of the store traits.
//!
//! The primary storage backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use scain_kernel_core::{
    AnchorReference, ClaimCode, ClaimStatus, Code, DeviceId, DeviceType, EventId,
    EventIntegrityRecord, HashAlgorithm, IngestionId, ProcessingStatus, RawIngestion, Value,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{classify_rejection, ClaimCodeStore, EventStore, InsertResult, RedeemOutcome};

/// How long a connection waits on a lock held by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CLAIM_COLUMNS: &str =
    "code, device_type, status, issued_at, expires_at, redeemed_by, redeemed_at";

const EVENT_COLUMNS: &str =
    "event_id, canonical_hash, algorithm, raw_payload, recorded_at, anchor_reference";

const INGESTION_COLUMNS: &str = "ingestion_id, device_type, device_id, device_timestamp, lot_code, \
     raw_data, received_at, status, processed_at, event_ids";

/// SQLite-based store implementation.
///
/// Thread-safe via an internal mutex. Separate handles (or processes) on the
/// same file are serialized by SQLite itself: redemption runs inside an
/// `IMMEDIATE` transaction.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database with an explicit busy timeout.
    pub fn open_with_busy_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opening sqlite store");
        Self::init(conn, busy_timeout)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    fn init(mut conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Raw column values of a `claim_codes` row, before domain validation.
struct ClaimRow {
    code: String,
    device_type: String,
    status: String,
    issued_at: i64,
    expires_at: Option<i64>,
    redeemed_by: Option<String>,
    redeemed_at: Option<i64>,
}

impl ClaimRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get("code")?,
            device_type: row.get("device_type")?,
            status: row.get("status")?,
            issued_at: row.get("issued_at")?,
            expires_at: row.get("expires_at")?,
            redeemed_by: row.get("redeemed_by")?,
            redeemed_at: row.get("redeemed_at")?,
        })
    }

    fn into_claim(self) -> Result<ClaimCode> {
        Ok(ClaimCode {
            code: Code::parse(&self.code).map_err(|e| StoreError::InvalidData(e.to_string()))?,
            device_type: self
                .device_type
                .parse::<DeviceType>()
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            status: self
                .status
                .parse::<ClaimStatus>()
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            redeemed_by: self.redeemed_by.map(DeviceId::new),
            redeemed_at: self.redeemed_at,
        })
    }
}

/// Raw column values of an `events` row.
struct EventRow {
    event_id: Vec<u8>,
    canonical_hash: String,
    algorithm: String,
    raw_payload: Vec<u8>,
    recorded_at: i64,
    anchor_reference: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get("event_id")?,
            canonical_hash: row.get("canonical_hash")?,
            algorithm: row.get("algorithm")?,
            raw_payload: row.get("raw_payload")?,
            recorded_at: row.get("recorded_at")?,
            anchor_reference: row.get("anchor_reference")?,
        })
    }

    fn into_record(self) -> Result<EventIntegrityRecord> {
        Ok(EventIntegrityRecord {
            event_id: EventId::try_from(self.event_id.as_slice())
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            canonical_hash: self.canonical_hash,
            algorithm: self
                .algorithm
                .parse::<HashAlgorithm>()
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            raw_payload: decode_payload(&self.raw_payload)?,
            recorded_at: self.recorded_at,
            anchor_reference: self.anchor_reference.map(AnchorReference::new),
        })
    }
}

/// Raw column values of a `raw_ingestions` row.
struct IngestionRow {
    ingestion_id: Vec<u8>,
    device_type: String,
    device_id: String,
    device_timestamp: i64,
    lot_code: Option<String>,
    raw_data: Vec<u8>,
    received_at: i64,
    status: String,
    processed_at: Option<i64>,
    event_ids: String,
}

impl IngestionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ingestion_id: row.get("ingestion_id")?,
            device_type: row.get("device_type")?,
            device_id: row.get("device_id")?,
            device_timestamp: row.get("device_timestamp")?,
            lot_code: row.get("lot_code")?,
            raw_data: row.get("raw_data")?,
            received_at: row.get("received_at")?,
            status: row.get("status")?,
            processed_at: row.get("processed_at")?,
            event_ids: row.get("event_ids")?,
        })
    }

    fn into_ingestion(self) -> Result<RawIngestion> {
        let invalid = |e: scain_kernel_core::CoreError| StoreError::InvalidData(e.to_string());

        let event_ids = self
            .event_ids
            .split(',')
            .filter(|id| !id.is_empty())
            .map(EventId::from_hex)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(invalid)?;

        Ok(RawIngestion {
            ingestion_id: IngestionId::try_from(self.ingestion_id.as_slice()).map_err(invalid)?,
            device_type: self.device_type.parse::<DeviceType>().map_err(invalid)?,
            device_id: DeviceId::new(self.device_id),
            timestamp: self.device_timestamp,
            lot_code: self.lot_code,
            raw_data: decode_payload(&self.raw_data)?,
            received_at: self.received_at,
            status: self.status.parse::<ProcessingStatus>().map_err(invalid)?,
            processed_at: self.processed_at,
            event_ids,
        })
    }
}

fn join_event_ids(ids: &[EventId]) -> String {
    ids.iter().map(EventId::to_hex).collect::<Vec<_>>().join(",")
}

fn encode_payload(payload: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(payload, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_payload(bytes: &[u8]) -> Result<Value> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn select_claim(conn: &Connection, code: &str) -> Result<Option<ClaimCode>> {
    conn.query_row(
        &format!("SELECT {CLAIM_COLUMNS} FROM claim_codes WHERE code = ?1"),
        params![code],
        ClaimRow::from_row,
    )
    .optional()?
    .map(ClaimRow::into_claim)
    .transpose()
}

#[async_trait]
impl ClaimCodeStore for SqliteStore {
    async fn insert_claim_code(&self, claim: &ClaimCode) -> Result<InsertResult> {
        let claim = claim.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT INTO claim_codes (code, device_type, status, issued_at, expires_at, redeemed_by, redeemed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(code) DO NOTHING",
                params![
                    claim.code.as_str(),
                    claim.device_type.as_str(),
                    claim.status.as_str(),
                    claim.issued_at,
                    claim.expires_at,
                    claim.redeemed_by.as_ref().map(DeviceId::as_str),
                    claim.redeemed_at,
                ],
            )?;

            Ok(if changed == 1 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_claim_code(&self, code: &Code) -> Result<Option<ClaimCode>> {
        let code = code.clone();
        self.run(move |conn| select_claim(conn, code.as_str())).await
    }

    async fn redeem_claim_code(
        &self,
        code: &Code,
        requested: DeviceType,
        device_id: &DeviceId,
        now: i64,
    ) -> Result<RedeemOutcome> {
        let code = code.clone();
        let device_id = device_id.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let changed = tx.execute(
                "UPDATE claim_codes
                 SET status = 'redeemed', redeemed_by = ?1, redeemed_at = ?2
                 WHERE code = ?3
                   AND status = 'issued'
                   AND device_type = ?4
                   AND (expires_at IS NULL OR ?2 <= expires_at)",
                params![device_id.as_str(), now, code.as_str(), requested.as_str()],
            )?;

            let current = select_claim(&tx, code.as_str())?;
            tx.commit()?;

            if changed == 1 {
                return match current {
                    Some(claim) => Ok(RedeemOutcome::Redeemed(claim)),
                    None => Err(StoreError::InvalidData(format!(
                        "claim code {code} missing after redemption"
                    ))),
                };
            }

            match classify_rejection(current.as_ref(), requested, now) {
                Some(rejection) => Ok(RedeemOutcome::Rejected(rejection)),
                None => Err(StoreError::InvalidData(format!(
                    "claim code {code} is redeemable but the update did not apply"
                ))),
            }
        })
        .await
    }

    async fn list_claim_codes(&self, device_type: Option<DeviceType>) -> Result<Vec<ClaimCode>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CLAIM_COLUMNS} FROM claim_codes
                 WHERE ?1 IS NULL OR device_type = ?1
                 ORDER BY issued_at, code"
            ))?;

            let rows = stmt
                .query_map(params![device_type.map(|t| t.as_str())], ClaimRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(ClaimRow::into_claim).collect()
        })
        .await
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert_event(&self, record: &EventIntegrityRecord) -> Result<InsertResult> {
        let payload = encode_payload(&record.raw_payload)?;
        let record = record.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT INTO events (event_id, canonical_hash, algorithm, raw_payload, recorded_at, anchor_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(event_id) DO NOTHING",
                params![
                    record.event_id.as_bytes().as_slice(),
                    record.canonical_hash,
                    record.algorithm.as_str(),
                    payload,
                    record.recorded_at,
                    record.anchor_reference.as_ref().map(AnchorReference::as_str),
                ],
            )?;

            Ok(if changed == 1 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<EventIntegrityRecord>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1"),
                params![id.as_bytes().as_slice()],
                EventRow::from_row,
            )
            .optional()?
            .map(EventRow::into_record)
            .transpose()
        })
        .await
    }

    async fn set_anchor_reference(&self, id: &EventId, reference: &AnchorReference) -> Result<bool> {
        let id = *id;
        let reference = reference.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE events SET anchor_reference = ?1
                 WHERE event_id = ?2 AND anchor_reference IS NULL",
                params![reference.as_str(), id.as_bytes().as_slice()],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn list_unanchored_events(&self, limit: usize) -> Result<Vec<EventIntegrityRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE anchor_reference IS NULL
                 ORDER BY recorded_at, event_id
                 LIMIT ?1"
            ))?;

            let rows = stmt
                .query_map(params![limit], EventRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(EventRow::into_record).collect()
        })
        .await
    }

    async fn insert_raw_ingestion(&self, ingestion: &RawIngestion) -> Result<InsertResult> {
        let raw_data = encode_payload(&ingestion.raw_data)?;
        let ingestion = ingestion.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO raw_ingestions ({INGESTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(ingestion_id) DO NOTHING"
                ),
                params![
                    ingestion.ingestion_id.as_bytes().as_slice(),
                    ingestion.device_type.as_str(),
                    ingestion.device_id.as_str(),
                    ingestion.timestamp,
                    ingestion.lot_code,
                    raw_data,
                    ingestion.received_at,
                    ingestion.status.as_str(),
                    ingestion.processed_at,
                    join_event_ids(&ingestion.event_ids),
                ],
            )?;

            Ok(if changed == 1 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_raw_ingestion(&self, id: &IngestionId) -> Result<Option<RawIngestion>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {INGESTION_COLUMNS} FROM raw_ingestions WHERE ingestion_id = ?1"),
                params![id.as_bytes().as_slice()],
                IngestionRow::from_row,
            )
            .optional()?
            .map(IngestionRow::into_ingestion)
            .transpose()
        })
        .await
    }

    async fn complete_raw_ingestion(
        &self,
        id: &IngestionId,
        status: ProcessingStatus,
        event_ids: &[EventId],
        processed_at: i64,
    ) -> Result<bool> {
        let id = *id;
        let event_ids = join_event_ids(event_ids);

        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE raw_ingestions
                 SET status = ?1, event_ids = ?2, processed_at = ?3
                 WHERE ingestion_id = ?4 AND status = 'pending'",
                params![status.as_str(), event_ids, processed_at, id.as_bytes().as_slice()],
            )?;
            Ok(changed == 1)
        })
        .await
    }
}
