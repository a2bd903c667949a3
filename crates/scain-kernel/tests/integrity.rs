//! Event recording, anchoring and tamper detection.

use std::sync::Arc;
use std::time::Duration;

use scain_kernel::store::{EventStore, MemoryStore};
use scain_kernel::{
    AnchorConfig, EventIntegrityRecord, HashAlgorithm, KernelError, Scain, ScainConfig,
    TamperReason, Value, Verification,
};
use scain_kernel_testkit::fixtures::sensor_payload;
use scain_kernel_testkit::{init_tracing, sample_payload_pair, TempDb, TestFixture, T0};

fn fast_anchor_config() -> ScainConfig {
    ScainConfig {
        anchor: AnchorConfig {
            attempt_timeout: Duration::from_millis(100),
            max_attempts: 2,
            retry_backoff: Duration::from_millis(5),
            queue_capacity: 64,
        },
        ..ScainConfig::default()
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn is_anchored(store: &dyn EventStore, record: &EventIntegrityRecord) -> bool {
    store
        .get_event(&record.event_id)
        .await
        .unwrap()
        .is_some_and(|r| r.anchor_reference.is_some())
}

#[tokio::test]
async fn test_field_order_gives_same_hash_distinct_ids() {
    let scain = Scain::new(Arc::new(MemoryStore::new()), ScainConfig::default());
    let (forward, reversed) = sample_payload_pair();

    let first = scain.events().record_event(forward).await.unwrap();
    let second = scain.events().record_event(reversed).await.unwrap();

    assert_eq!(first.canonical_hash, second.canonical_hash);
    assert_eq!(
        first.canonical_hash,
        "8baa73198470c7bb4c3ce142a8fd651affc0310d878bb9bd159e37a573fb4874"
    );
    assert_ne!(first.event_id, second.event_id);
}

#[tokio::test]
async fn test_anchored_event_verifies() {
    init_tracing();
    let fixture = TestFixture::new();
    let scain = Scain::with_anchor(fixture.store.clone(), fixture.ledger.clone(), fast_anchor_config());

    let record = scain
        .events()
        .record_event_at(sensor_payload("esp-1", 3.5), T0)
        .await
        .unwrap();
    eventually("anchor write-back", || is_anchored(fixture.store.as_ref(), &record)).await;

    assert_eq!(
        scain.events().verify_event(&record.event_id).await.unwrap(),
        Verification::Verified
    );
    assert_eq!(scain.events().anchor_stats().unwrap().anchored, 1);
    assert_eq!(fixture.ledger.len().await, 1);

    scain.shutdown().await;
}

#[tokio::test]
async fn test_ledger_disagreement_is_tampering() {
    let fixture = TestFixture::new();
    let scain = Scain::with_anchor(fixture.store.clone(), fixture.ledger.clone(), fast_anchor_config());

    let record = scain
        .events()
        .record_event(sensor_payload("esp-2", -18.0))
        .await
        .unwrap();
    eventually("anchor write-back", || is_anchored(fixture.store.as_ref(), &record)).await;

    fixture.ledger.overwrite(record.event_id, "0".repeat(64)).await;
    assert_eq!(
        scain.events().verify_event(&record.event_id).await.unwrap(),
        Verification::Tampered {
            reason: TamperReason::AnchorMismatch
        }
    );

    scain.shutdown().await;
}

#[tokio::test]
async fn test_forged_record_is_local_mismatch() {
    let fixture = TestFixture::new();
    let scain = Scain::with_anchor(fixture.store.clone(), fixture.ledger.clone(), fast_anchor_config());

    // The payload says 3.5 but the hash was taken over a different reading.
    let hasher = scain.events().hasher();
    let mut forged =
        EventIntegrityRecord::new(hasher, sensor_payload("esp-3", 3.5), HashAlgorithm::Sha256, T0).unwrap();
    forged.canonical_hash = hasher
        .compute(&sensor_payload("esp-3", 9.0), HashAlgorithm::Sha256)
        .unwrap();
    fixture.store.insert_event(&forged).await.unwrap();

    assert_eq!(
        scain.events().verify_event(&forged.event_id).await.unwrap(),
        Verification::Tampered {
            reason: TamperReason::LocalHashMismatch
        }
    );

    scain.shutdown().await;
}

#[tokio::test]
async fn test_edited_database_row_is_detected() {
    let db = TempDb::new();
    let scain = Scain::open(db.path(), ScainConfig::default()).unwrap();
    let record = scain
        .events()
        .record_event(sensor_payload("lora-9", 5.0))
        .await
        .unwrap();
    assert_eq!(
        scain.events().verify_event(&record.event_id).await.unwrap(),
        Verification::AnchorUnavailable
    );

    let conn = rusqlite::Connection::open(db.path()).unwrap();
    let forged_hash = "f".repeat(64);
    let changed = conn
        .execute(
            "UPDATE events SET canonical_hash = ?1 WHERE event_id = ?2",
            rusqlite::params![forged_hash, record.event_id.0.to_vec()],
        )
        .unwrap();
    assert_eq!(changed, 1);

    assert_eq!(
        scain.events().verify_event(&record.event_id).await.unwrap(),
        Verification::Tampered {
            reason: TamperReason::LocalHashMismatch
        }
    );
}

#[tokio::test]
async fn test_ledger_outage_keeps_event_and_recovers() {
    let fixture = TestFixture::new();
    fixture.ledger.set_offline(true);
    let scain = Scain::with_anchor(fixture.store.clone(), fixture.ledger.clone(), fast_anchor_config());

    let record = scain
        .events()
        .record_event(sensor_payload("trk-1", 7.25))
        .await
        .unwrap();
    let events = scain.events();
    eventually("anchoring to give up", || async move {
        events.anchor_stats().unwrap().failed == 1
    })
    .await;

    let stored = fixture.store.get_event(&record.event_id).await.unwrap().unwrap();
    assert_eq!(stored.anchor_reference, None);
    assert_eq!(stored.canonical_hash, record.canonical_hash);
    assert_eq!(
        scain.events().verify_event(&record.event_id).await.unwrap(),
        Verification::AnchorUnavailable
    );

    fixture.ledger.set_offline(false);
    assert_eq!(scain.events().reanchor_pending(10).await.unwrap(), 1);
    eventually("re-anchoring", || is_anchored(fixture.store.as_ref(), &record)).await;
    assert_eq!(
        scain.events().verify_event(&record.event_id).await.unwrap(),
        Verification::Verified
    );

    scain.shutdown().await;
}

#[tokio::test]
async fn test_slow_ledger_times_out() {
    let fixture = TestFixture::new();
    fixture.ledger.set_latency(Some(Duration::from_millis(500))).await;
    let mut config = fast_anchor_config();
    config.anchor.attempt_timeout = Duration::from_millis(20);
    config.anchor.max_attempts = 1;
    let scain = Scain::with_anchor(fixture.store.clone(), fixture.ledger.clone(), config);

    let record = scain.events().record_event(Value::from("slow")).await.unwrap();
    let events = scain.events();
    eventually("the attempt to time out", || async move {
        events.anchor_stats().unwrap().failed == 1
    })
    .await;

    assert!(!is_anchored(fixture.store.as_ref(), &record).await);
    scain.shutdown().await;
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let fixture = TestFixture::new();
    fixture.ledger.fail_next(1);
    let scain = Scain::with_anchor(fixture.store.clone(), fixture.ledger.clone(), fast_anchor_config());

    let record = scain.events().record_event(Value::from(42)).await.unwrap();
    eventually("anchor write-back", || is_anchored(fixture.store.as_ref(), &record)).await;

    assert_eq!(fixture.ledger.calls(), 2);
    assert_eq!(scain.events().anchor_stats().unwrap().failed, 0);
    scain.shutdown().await;
}

#[tokio::test]
async fn test_unknown_event_is_an_error() {
    let scain = Scain::new(Arc::new(MemoryStore::new()), ScainConfig::default());
    let id = scain_kernel::EventId::generate();
    assert!(matches!(
        scain.events().verify_event(&id).await,
        Err(KernelError::EventNotFound(_))
    ));
}

#[tokio::test]
async fn test_compute_and_verify_hash() {
    let scain = Scain::new(Arc::new(MemoryStore::new()), ScainConfig::default());
    let (forward, reversed) = sample_payload_pair();

    let digest = scain.compute_hash(&forward, HashAlgorithm::Sha256).unwrap();
    assert!(scain.verify_hash(&reversed, &digest, HashAlgorithm::Sha256));
    assert!(scain.verify_hash(&reversed, &digest.to_uppercase(), HashAlgorithm::Sha256));
    assert!(!scain.verify_hash(&reversed, &digest, HashAlgorithm::Sha512));
    assert!(!scain.verify_hash(&Value::Float(f64::NAN), &digest, HashAlgorithm::Sha256));
    assert_eq!(scain.encode(&reversed).unwrap(), br#"{"a":1,"b":[1,2]}"#.to_vec());
}
