//! Database schema migrations for SQLite.
//!
//! Versioned: each migration transforms the schema from version N to N+1.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent, and safe when several handles open the same file: the version
/// is read inside an immediate transaction.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current: u32 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    for version in (current + 1)..=CURRENT_VERSION {
        apply_migration(&tx, version)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, scain_kernel_core::now_millis()],
        )?;
        tracing::info!(version, "applied schema migration");
    }

    tx.commit()?;
    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE claim_codes (
            code TEXT PRIMARY KEY,            -- 8 chars, A-Z0-9
            device_type TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('issued', 'redeemed')),
            issued_at INTEGER NOT NULL,       -- Unix ms
            expires_at INTEGER,               -- Unix ms, NULL never expires
            redeemed_by TEXT,
            redeemed_at INTEGER,

            CHECK ((status = 'issued') = (redeemed_by IS NULL)),
            CHECK ((status = 'issued') = (redeemed_at IS NULL))
        );

        -- A redeemed code is frozen
        CREATE TRIGGER claim_codes_redeemed_immutable
        BEFORE UPDATE ON claim_codes
        WHEN OLD.status = 'redeemed'
        BEGIN
            SELECT RAISE(ABORT, 'redeemed claim codes are immutable');
        END;

        CREATE TRIGGER claim_codes_no_delete
        BEFORE DELETE ON claim_codes
        BEGIN
            SELECT RAISE(ABORT, 'claim codes are never deleted');
        END;

        CREATE TABLE events (
            event_id BLOB PRIMARY KEY,        -- 16 bytes
            canonical_hash TEXT NOT NULL,     -- lowercase hex
            algorithm TEXT NOT NULL,
            raw_payload BLOB NOT NULL,        -- CBOR of the hashed value
            recorded_at INTEGER NOT NULL,     -- Unix ms
            anchor_reference TEXT
        );

        CREATE INDEX idx_claim_codes_type ON claim_codes(device_type, issued_at);
        CREATE INDEX idx_events_unanchored ON events(recorded_at)
            WHERE anchor_reference IS NULL;
        "#,
    )?;

    Ok(())
}

/// Migration v2: raw readings kept for audit.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE raw_ingestions (
            ingestion_id BLOB PRIMARY KEY,    -- 16 bytes
            device_type TEXT NOT NULL,
            device_id TEXT NOT NULL,
            device_timestamp INTEGER NOT NULL, -- Unix ms, device clock
            lot_code TEXT,
            raw_data BLOB NOT NULL,           -- CBOR of the reading
            received_at INTEGER NOT NULL,     -- Unix ms
            status TEXT NOT NULL
                CHECK (status IN ('pending', 'processed', 'skipped', 'failed')),
            processed_at INTEGER,
            event_ids TEXT NOT NULL DEFAULT '', -- comma-separated hex ids

            CHECK ((status = 'pending') = (processed_at IS NULL))
        );

        CREATE INDEX idx_raw_ingestions_device ON raw_ingestions(device_id, received_at);
        "#,
    )?;

    Ok(())
}
