//! Error types for the SCAIN Kernel Core.

use thiserror::Error;

use crate::claim::DeviceType;

/// Errors raised while canonically encoding a [`Value`](crate::Value).
///
/// Always fatal to the single encode call. Values are never coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("non-finite number at {path}")]
    NonFiniteNumber { path: String },

    #[error("duplicate key {key} at {path}")]
    DuplicateKey { path: String, key: String },

    #[error("string serialization failed: {0}")]
    Serialization(String),
}

/// Expected, user-facing outcomes of a failed redemption.
///
/// Callers are meant to branch on these, they are not exceptional.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("claim code not found")]
    NotFound,

    #[error("claim code has already been used")]
    AlreadyUsed,

    #[error("claim code has expired")]
    Expired,

    #[error("device type mismatch: code is for {expected}, request was for {requested}")]
    TypeMismatch {
        expected: DeviceType,
        requested: DeviceType,
    },

    #[error("malformed claim code: {0}")]
    MalformedCode(String),
}

/// Parse errors for the textual forms of core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unsupported hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    #[error("unknown claim status: {0}")]
    UnknownStatus(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
