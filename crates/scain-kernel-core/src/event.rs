//! Event integrity records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EncodingError;
use crate::hash::{HashAlgorithm, Hasher};
use crate::types::EventId;
use crate::value::Value;

/// Transaction identifier returned by an external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorReference(pub String);

impl AnchorReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnchorReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payload together with the canonical hash taken when it was recorded.
///
/// `canonical_hash` always equals `Hasher::compute(raw_payload, algorithm)`
/// for an untampered record. `anchor_reference` is advisory and never needed
/// for local verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventIntegrityRecord {
    pub event_id: EventId,
    pub canonical_hash: String,
    pub algorithm: HashAlgorithm,
    pub raw_payload: Value,
    /// Unix ms.
    pub recorded_at: i64,
    pub anchor_reference: Option<AnchorReference>,
}

impl EventIntegrityRecord {
    /// Hash `payload` and wrap it in a new record with a fresh id.
    pub fn new(
        hasher: &Hasher,
        payload: Value,
        algorithm: HashAlgorithm,
        recorded_at: i64,
    ) -> Result<Self, EncodingError> {
        let canonical_hash = hasher.compute(&payload, algorithm)?;
        Ok(Self {
            event_id: EventId::generate(),
            canonical_hash,
            algorithm,
            raw_payload: payload,
            recorded_at,
            anchor_reference: None,
        })
    }

    /// Recompute the hash of the stored payload and compare.
    pub fn is_intact(&self, hasher: &Hasher) -> bool {
        hasher.verify(&self.raw_payload, &self.canonical_hash, self.algorithm)
    }
}
