//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use scain_kernel_anchor::MemoryLedger;
use scain_kernel_core::{DeviceType, Value};
use scain_kernel_store::{MemoryStore, SqliteStore};
use tempfile::TempDir;

/// Fixed clock value used across scenarios: 2023-11-14T22:13:20Z.
pub const T0: i64 = 1_700_000_000_000;

/// An in-memory store and ledger pair.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            ledger: Arc::new(MemoryLedger::new()),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A SQLite database file inside a temporary directory.
///
/// The directory, and the database with it, is removed on drop.
pub struct TempDb {
    dir: TempDir,
}

impl TempDb {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap_or_else(|e| panic!("cannot create temp dir: {e}")),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("scain.db")
    }

    /// Open a fresh handle on the database. Every call returns an
    /// independent connection to the same file.
    pub fn open(&self) -> SqliteStore {
        SqliteStore::open(self.path()).unwrap_or_else(|e| panic!("cannot open {:?}: {e}", self.path()))
    }
}

impl Default for TempDb {
    fn default() -> Self {
        Self::new()
    }
}

/// `{a:1, b:[1,2]}` built in both field orders.
pub fn sample_payload_pair() -> (Value, Value) {
    let forward = Value::record()
        .field("a", 1)
        .field("b", Value::sequence([1, 2]))
        .build();
    let reversed = Value::record()
        .field("b", Value::sequence([1, 2]))
        .field("a", 1)
        .build();
    (forward, reversed)
}

/// A cold-chain reading as a device would report it.
pub fn sensor_payload(device: &str, temperature: f64) -> Value {
    Value::record()
        .field("deviceId", device)
        .field("temperature", temperature)
        .field("humidity", 71)
        .field("recordedAt", T0)
        .build()
}

/// JSON form of a raw sensor reading.
pub fn sensor_ingest_json(device_type: DeviceType, device_id: &str) -> serde_json::Value {
    serde_json::json!({
        "deviceType": device_type.as_str(),
        "deviceId": device_id,
        "timestamp": T0,
        "lotCode": "LOT-2023-11",
        "data": {"temperature": 3.5, "humidity": 71}
    })
}

/// JSON form of a tracker reading. Without coordinates the reading
/// produces no events.
pub fn tracker_ingest_json(device_id: &str, with_position: bool) -> serde_json::Value {
    let data = if with_position {
        serde_json::json!({"latitude": 37.7749, "longitude": -122.4194, "speed": 12})
    } else {
        serde_json::json!({"speed": 12})
    };
    serde_json::json!({
        "deviceType": "Tracker",
        "deviceId": device_id,
        "timestamp": T0,
        "data": data
    })
}

/// JSON form of an ERP business transaction feed.
pub fn erp_ingest_json(system_id: &str) -> serde_json::Value {
    serde_json::json!({
        "deviceType": "ERP",
        "deviceId": system_id,
        "timestamp": T0,
        "lotCode": "LOT-2023-11",
        "data": {
            "businessStep": "shipping",
            "transactions": [
                {"type": "po", "id": "PO-1001"},
                {"type": "desadv", "id": "ASN-77"}
            ]
        }
    })
}

/// Install a test-friendly tracing subscriber. Safe to call many times.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use scain_kernel_core::canonical_bytes;
    use scain_kernel_store::ClaimCodeStore;

    #[test]
    fn test_payload_pair_encodes_identically() {
        let (a, b) = sample_payload_pair();
        assert_ne!(a, b);
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[tokio::test]
    async fn test_temp_db_handles_share_a_file() {
        let db = TempDb::new();
        let first = db.open();
        let second = db.open();

        let code = scain_kernel_core::Code::parse("ABCDEFGH").unwrap();
        let claim = scain_kernel_core::ClaimCode::issued(code.clone(), DeviceType::Esp32, T0, None);
        first.insert_claim_code(&claim).await.unwrap();

        assert_eq!(second.get_claim_code(&code).await.unwrap(), Some(claim));
    }

    #[test]
    fn test_ingest_json_names_parse() {
        for json in [
            sensor_ingest_json(DeviceType::LoRaWan, "lora-1"),
            tracker_ingest_json("trk-1", true),
            erp_ingest_json("erp-1"),
        ] {
            let name = json["deviceType"].as_str().unwrap();
            assert!(name.parse::<DeviceType>().is_ok(), "{name}");
        }
    }
}
