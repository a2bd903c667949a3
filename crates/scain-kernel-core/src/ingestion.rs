//! Audit records for raw device readings.
//!
//! Every reading handed to ingestion is stored as received, before it is
//! transformed, and later marked with the outcome of processing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::claim::DeviceType;
use crate::error::CoreError;
use crate::types::{DeviceId, EventId};
use crate::value::Value;

/// Identifier of a stored raw reading. Same format as an event id.
pub type IngestionId = EventId;

/// Where a raw reading is in processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStatus {
    /// Stored, not yet transformed.
    Pending,
    /// Every transformed event was recorded.
    Processed,
    /// The reading produced no events.
    Skipped,
    /// Transformation failed, or at least one event could not be recorded.
    Failed,
}

impl ProcessingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Skipped => "skipped",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processed" => Ok(ProcessingStatus::Processed),
            "skipped" => Ok(ProcessingStatus::Skipped),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// A raw reading as received, plus its processing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIngestion {
    pub ingestion_id: IngestionId,
    pub device_type: DeviceType,
    pub device_id: DeviceId,
    /// Device clock, Unix ms.
    pub timestamp: i64,
    pub lot_code: Option<String>,
    pub raw_data: Value,
    /// Unix ms.
    pub received_at: i64,
    pub status: ProcessingStatus,
    /// Unix ms. Set once the status leaves `Pending`.
    pub processed_at: Option<i64>,
    /// Events recorded from this reading.
    pub event_ids: Vec<EventId>,
}

impl RawIngestion {
    /// A freshly received reading with a new id.
    pub fn received(
        device_type: DeviceType,
        device_id: DeviceId,
        timestamp: i64,
        lot_code: Option<String>,
        raw_data: Value,
        received_at: i64,
    ) -> Self {
        Self {
            ingestion_id: IngestionId::generate(),
            device_type,
            device_id,
            timestamp,
            lot_code,
            raw_data,
            received_at,
            status: ProcessingStatus::Pending,
            processed_at: None,
            event_ids: Vec::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProcessingStatus::Pending
    }
}
