//! Event commands: record, ingest, verify, show.

use std::path::Path;

use anyhow::{bail, Context, Result};
use scain_kernel::{EventId, EventIntegrityRecord, RawIngest, Scain, Verification};

use crate::input::{read_json, read_value};

pub async fn record(scain: &Scain, input: Option<&Path>) -> Result<()> {
    let payload = read_value(input)?;
    let record = scain
        .events()
        .record_event(payload)
        .await
        .context("failed to record event")?;
    print_record(&record);
    Ok(())
}

pub async fn ingest(scain: &Scain, input: Option<&Path>) -> Result<()> {
    let raw = RawIngest::from_json(read_json(input)?)?;
    let report = scain.events().ingest(&raw).await?;

    println!("ingestion {} {}", report.ingestion_id, report.status);
    if let Some(reason) = &report.skipped_reason {
        println!("skipped: {reason}");
    }
    for record in &report.recorded {
        print_record(record);
    }
    for failure in &report.failures {
        eprintln!("event {} failed: {}", failure.index, failure.error);
    }

    if !report.is_complete() {
        bail!("{} of the transformed events were not recorded", report.failures.len());
    }
    Ok(())
}

pub async fn verify(scain: &Scain, event_id: &str) -> Result<()> {
    let event_id: EventId = event_id.parse().context("invalid event id")?;

    match scain.events().verify_event(&event_id).await? {
        Verification::Verified => println!("verified"),
        Verification::AnchorUnavailable => println!("intact (no anchor to compare)"),
        Verification::Tampered { reason } => bail!("tampered: {reason:?}"),
    }
    Ok(())
}

pub async fn show(scain: &Scain, event_id: &str) -> Result<()> {
    let event_id: EventId = event_id.parse().context("invalid event id")?;
    let record = scain.events().get_event(&event_id).await?;
    let canonical = scain
        .encode(&record.raw_payload)
        .context("stored payload no longer encodes")?;

    print!("{}", describe(&record, &canonical));
    Ok(())
}

fn describe(record: &EventIntegrityRecord, canonical: &[u8]) -> String {
    let anchor = record
        .anchor_reference
        .as_ref()
        .map_or("-", |r| r.as_str());
    format!(
        "event:     {}\nhash:      {}:{}\nrecorded:  {}\nanchor:    {}\npayload:   {}\n",
        record.event_id,
        record.algorithm,
        record.canonical_hash,
        record.recorded_at,
        anchor,
        String::from_utf8_lossy(canonical)
    )
}

fn print_record(record: &EventIntegrityRecord) {
    println!("{} {}:{}", record.event_id, record.algorithm, record.canonical_hash);
}

#[cfg(test)]
mod tests {
    use super::*;
    use scain_kernel::core::AnchorReference;
    use scain_kernel::{HashAlgorithm, ScainConfig, Value};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_describe_recorded_event() {
        let scain = Scain::new(
            Arc::new(scain_kernel::store::MemoryStore::new()),
            ScainConfig::default(),
        );
        let payload = Value::record().field("b", 2).field("a", "x").build();
        let mut record = scain.events().record_event_at(payload, 42).await.unwrap();
        let fetched = scain.events().get_event(&record.event_id).await.unwrap();
        assert_eq!(fetched, record);

        let canonical = scain.encode(&fetched.raw_payload).unwrap();
        let text = describe(&fetched, &canonical);
        assert!(text.contains(&format!("event:     {}", record.event_id)));
        assert!(text.contains(&format!("{}:{}", HashAlgorithm::Sha256, record.canonical_hash)));
        assert!(text.contains("recorded:  42"));
        assert!(text.contains("anchor:    -"));
        assert!(text.contains(r#"payload:   {"a":"x","b":2}"#));

        record.anchor_reference = Some(AnchorReference::new("tx-9"));
        assert!(describe(&record, &canonical).contains("anchor:    tx-9"));
    }
}
