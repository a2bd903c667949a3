//! Raw device data ingestion.
//!
//! Turns a device's raw reading into supply-chain event payloads and records
//! each one through the integrity pipeline. The reading itself is stored
//! first, as received, and marked with the outcome once processing ends.

use scain_kernel_core::{
    now_millis, DeviceId, DeviceType, EventId, EventIntegrityRecord, IngestionId, ProcessingStatus,
    RawIngestion, Value,
};
use scain_kernel_store::InsertResult;

use crate::error::{bounded, KernelError, Result};
use crate::integrity::EventIntegrityPipeline;

const OBJECT_EVENT: &str = "ObjectEvent";
const TRANSACTION_EVENT: &str = "TransactionEvent";
const UTC_OFFSET: &str = "+00:00";

/// A raw reading as sent by a device or business system.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIngest {
    pub device_type: DeviceType,
    pub device_id: DeviceId,
    /// Unix ms.
    pub timestamp: i64,
    pub lot_code: Option<String>,
    /// Named readings. Must be a record or a map.
    pub data: Value,
}

impl RawIngest {
    /// Parse the JSON form:
    /// `{"deviceType", "deviceId", "timestamp" (Unix ms), "lotCode"?, "data": {...}}`.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let text = |name: &str| -> Result<String> {
            json.get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| KernelError::InvalidIngest(format!("missing string field {name:?}")))
        };

        let device_type = text("deviceType")?.parse::<DeviceType>()?;
        let device_id = DeviceId::new(text("deviceId")?);
        let timestamp = json
            .get("timestamp")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| KernelError::InvalidIngest("missing integer field \"timestamp\"".into()))?;
        let lot_code = json
            .get("lotCode")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let data = json
            .get("data")
            .filter(|d| d.is_object())
            .cloned()
            .map(Value::from)
            .ok_or_else(|| KernelError::InvalidIngest("\"data\" must be an object".into()))?;

        Ok(Self {
            device_type,
            device_id,
            timestamp,
            lot_code,
            data,
        })
    }
}

/// A transformed event that could not be recorded.
#[derive(Debug)]
pub struct IngestFailure {
    /// Position in the transformed batch.
    pub index: usize,
    pub error: KernelError,
}

/// What [`EventIntegrityPipeline::ingest`] did with a raw reading.
#[derive(Debug)]
pub struct IngestReport {
    /// Id of the stored raw reading.
    pub ingestion_id: IngestionId,
    /// Final status written to the stored reading.
    pub status: ProcessingStatus,
    pub recorded: Vec<EventIntegrityRecord>,
    pub failures: Vec<IngestFailure>,
    /// Set when the reading legitimately produced no events.
    pub skipped_reason: Option<String>,
}

impl IngestReport {
    fn new(ingestion_id: IngestionId) -> Self {
        Self {
            ingestion_id,
            status: ProcessingStatus::Pending,
            recorded: Vec::new(),
            failures: Vec::new(),
            skipped_reason: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Transform a raw reading into event payloads.
///
/// An empty result is valid (a tracker reading without a position).
pub fn transform(raw: &RawIngest) -> Result<Vec<Value>> {
    if !matches!(raw.data, Value::Record(_) | Value::Map(_)) {
        return Err(KernelError::InvalidIngest(
            "data must be a record or a map".into(),
        ));
    }

    let events = match raw.device_type {
        DeviceType::Esp32 | DeviceType::ExpressLink | DeviceType::LoRaWan => {
            vec![sensor_event(raw)]
        }
        DeviceType::Tracker => tracker_event(raw)?.into_iter().collect(),
        DeviceType::Erp => vec![transaction_event(raw)?],
    };

    tracing::debug!(
        device_type = %raw.device_type,
        device_id = %raw.device_id,
        event_count = events.len(),
        "raw data transformed"
    );
    Ok(events)
}

fn event_base(raw: &RawIngest, event_type: &str) -> scain_kernel_core::RecordBuilder {
    Value::record()
        .field("eventType", event_type)
        .field("eventTime", raw.timestamp)
        .field("eventTimeZoneOffset", UTC_OFFSET)
        .field("deviceId", raw.device_id.as_str())
        .field("deviceTimestamp", raw.timestamp)
        .optional("lotCode", raw.lot_code.clone())
}

/// One report per reading, ordered by reading name.
fn sensor_event(raw: &RawIngest) -> Value {
    let mut readings = raw.data.named_entries();
    readings.sort_by(|a, b| a.0.cmp(b.0));

    let reports: Vec<Value> = readings
        .into_iter()
        .map(|(name, value)| {
            Value::record()
                .field("type", name)
                .field("value", value.clone())
                .field("time", raw.timestamp)
                .build()
        })
        .collect();

    let element = Value::record()
        .field(
            "sensorMetaData",
            Value::record()
                .field("deviceId", raw.device_id.as_str())
                .field(
                    "deviceMetadata",
                    Value::record().field("type", raw.device_type.as_str()).build(),
                )
                .build(),
        )
        .field("sensorReport", Value::Sequence(reports))
        .build();

    event_base(raw, OBJECT_EVENT)
        .field("sensorElementList", Value::sequence([element]))
        .build()
}

fn tracker_event(raw: &RawIngest) -> Result<Option<Value>> {
    let coordinate = |name: &str| -> Result<Option<String>> {
        match raw.data.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(n)) => Ok(Some(n.to_string())),
            Some(Value::Float(f)) if f.is_finite() => Ok(Some(f.to_string())),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(KernelError::InvalidIngest(format!(
                "{name} must be a number, got {other:?}"
            ))),
        }
    };

    let (Some(lat), Some(lng)) = (coordinate("latitude")?, coordinate("longitude")?) else {
        return Ok(None);
    };

    Ok(Some(
        event_base(raw, OBJECT_EVENT)
            .field(
                "readPoint",
                Value::record().field("id", format!("geo:{lat},{lng}")).build(),
            )
            .build(),
    ))
}

fn transaction_event(raw: &RawIngest) -> Result<Value> {
    let biz_step = raw.data.get("businessStep").and_then(Value::as_str);

    let transactions = match raw.data.get("transactions") {
        Some(Value::Sequence(items)) => Some(
            items
                .iter()
                .enumerate()
                .filter(|(_, t)| matches!(t, Value::Record(_) | Value::Map(_)))
                .map(|(i, t)| biz_transaction(i, t))
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => None,
    };

    Ok(event_base(raw, TRANSACTION_EVENT)
        .optional("bizStep", biz_step)
        .optional("bizTransactionList", transactions)
        .build())
}

fn biz_transaction(index: usize, entry: &Value) -> Result<Value> {
    let field = |name: &str| {
        entry.get(name).and_then(Value::as_str).ok_or_else(|| {
            KernelError::InvalidIngest(format!("transactions[{index}] lacks a string {name:?}"))
        })
    };

    Ok(Value::record()
        .field("type", field("type")?)
        .field("bizTransaction", field("id")?)
        .build())
}

impl EventIntegrityPipeline {
    /// Store `raw`, transform it and record every resulting event.
    ///
    /// The reading is persisted as `Pending` before it is transformed.
    /// Transformation problems fail the whole call and mark the reading
    /// `Failed`. Recording problems are collected per event in the report;
    /// events before and after a failure are still recorded.
    pub async fn ingest(&self, raw: &RawIngest) -> Result<IngestReport> {
        self.ingest_at(raw, now_millis()).await
    }

    /// [`ingest`](Self::ingest) with an explicit clock.
    pub async fn ingest_at(&self, raw: &RawIngest, now: i64) -> Result<IngestReport> {
        let audit = RawIngestion::received(
            raw.device_type,
            raw.device_id.clone(),
            raw.timestamp,
            raw.lot_code.clone(),
            raw.data.clone(),
            now,
        );
        let ingestion_id = audit.ingestion_id;

        match bounded(self.store_timeout(), self.store().insert_raw_ingestion(&audit)).await? {
            InsertResult::Inserted => {}
            InsertResult::AlreadyExists => {
                return Err(KernelError::InvalidOperation(format!(
                    "ingestion id {ingestion_id} already in use"
                )));
            }
        }
        tracing::debug!(ingestion_id = %ingestion_id, device_id = %raw.device_id, "raw reading stored");

        let events = match transform(raw) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(ingestion_id = %ingestion_id, error = %e, "raw reading rejected");
                self.complete_ingestion(&ingestion_id, ProcessingStatus::Failed, &[], now)
                    .await;
                return Err(e);
            }
        };

        let mut report = IngestReport::new(ingestion_id);
        if events.is_empty() {
            report.skipped_reason = Some(format!(
                "{} reading produced no events (missing latitude or longitude)",
                raw.device_type
            ));
            report.status = ProcessingStatus::Skipped;
            tracing::info!(
                ingestion_id = %ingestion_id,
                device_id = %raw.device_id,
                reason = report.skipped_reason.as_deref().unwrap_or_default(),
                "ingest skipped"
            );
            self.complete_ingestion(&ingestion_id, report.status, &[], now).await;
            return Ok(report);
        }

        for (index, event) in events.into_iter().enumerate() {
            match self.record_event_at(event, now).await {
                Ok(record) => report.recorded.push(record),
                Err(error) => {
                    tracing::warn!(device_id = %raw.device_id, index, error = %error, "failed to record ingested event");
                    report.failures.push(IngestFailure { index, error });
                }
            }
        }

        report.status = if report.is_complete() {
            ProcessingStatus::Processed
        } else {
            ProcessingStatus::Failed
        };
        let event_ids: Vec<EventId> = report.recorded.iter().map(|r| r.event_id).collect();
        self.complete_ingestion(&ingestion_id, report.status, &event_ids, now).await;

        tracing::info!(
            ingestion_id = %ingestion_id,
            device_type = %raw.device_type,
            device_id = %raw.device_id,
            recorded = report.recorded.len(),
            failed = report.failures.len(),
            "ingest complete"
        );
        Ok(report)
    }

    /// The stored reading keeps `Pending` if this write fails.
    async fn complete_ingestion(
        &self,
        id: &IngestionId,
        status: ProcessingStatus,
        event_ids: &[EventId],
        now: i64,
    ) {
        let update = self.store().complete_raw_ingestion(id, status, event_ids, now);
        match bounded(self.store_timeout(), update).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(ingestion_id = %id, status = %status, "raw reading was no longer pending");
            }
            Err(e) => {
                tracing::warn!(ingestion_id = %id, status = %status, error = %e, "failed to update raw reading status");
            }
        }
    }

    /// Fetch a stored raw reading by id.
    pub async fn get_ingestion(&self, id: &IngestionId) -> Result<RawIngestion> {
        bounded(self.store_timeout(), self.store().get_raw_ingestion(id))
            .await?
            .ok_or(KernelError::IngestionNotFound(*id))
    }
}
