//! Claim codes: one-time tokens binding a device slot to its first redeemer.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ClaimError, CoreError};
use crate::types::DeviceId;

/// Symbols a claim code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fixed length of a claim code.
pub const CODE_LEN: usize = 8;

/// A well-formed claim code: exactly 8 symbols from [`CODE_ALPHABET`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(String);

impl Code {
    /// Validate the format of a code. No store is consulted.
    pub fn parse(s: &str) -> Result<Self, ClaimError> {
        if s.len() != CODE_LEN {
            return Err(ClaimError::MalformedCode(format!(
                "expected {CODE_LEN} characters, got {}",
                s.chars().count()
            )));
        }
        if let Some(c) = s.bytes().find(|b| !CODE_ALPHABET.contains(b)) {
            return Err(ClaimError::MalformedCode(format!(
                "invalid character {:?}",
                c as char
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Generate a code from the operating system's CSPRNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a code from a caller-supplied cryptographic RNG.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let code: String = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({})", self.0)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Code {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Code {
    type Error = ClaimError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.0
    }
}

/// Kinds of devices known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "ESP32")]
    Esp32,
    ExpressLink,
    #[serde(rename = "LoRaWAN")]
    LoRaWan,
    Tracker,
    /// Business system feed. Produces events but is never claimed.
    #[serde(rename = "ERP")]
    Erp,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::Esp32,
        DeviceType::ExpressLink,
        DeviceType::LoRaWan,
        DeviceType::Tracker,
        DeviceType::Erp,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Esp32 => "ESP32",
            DeviceType::ExpressLink => "ExpressLink",
            DeviceType::LoRaWan => "LoRaWAN",
            DeviceType::Tracker => "Tracker",
            DeviceType::Erp => "ERP",
        }
    }

    /// Whether claim codes may be issued for this type.
    pub const fn is_claimable(&self) -> bool {
        !matches!(self, DeviceType::Erp)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownDeviceType(s.to_string()))
    }
}

/// Stored lifecycle status. Expiry is derived at redemption time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Issued,
    Redeemed,
}

impl ClaimStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Issued => "issued",
            ClaimStatus::Redeemed => "redeemed",
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(ClaimStatus::Issued),
            "redeemed" => Ok(ClaimStatus::Redeemed),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// A claim code and its redemption state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCode {
    pub code: Code,
    pub device_type: DeviceType,
    pub status: ClaimStatus,
    /// Unix ms.
    pub issued_at: i64,
    /// Unix ms. `None` never expires.
    pub expires_at: Option<i64>,
    pub redeemed_by: Option<DeviceId>,
    /// Unix ms.
    pub redeemed_at: Option<i64>,
}

impl ClaimCode {
    /// A freshly issued, unredeemed code.
    pub fn issued(code: Code, device_type: DeviceType, issued_at: i64, expires_at: Option<i64>) -> Self {
        Self {
            code,
            device_type,
            status: ClaimStatus::Issued,
            issued_at,
            expires_at,
            redeemed_by: None,
            redeemed_at: None,
        }
    }

    /// `now` strictly after `expires_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    /// Check whether a redemption request would be accepted.
    ///
    /// Checks run in a fixed order: status, expiry, type.
    pub fn check_redeemable(&self, requested: DeviceType, now: i64) -> Result<(), ClaimError> {
        if self.status == ClaimStatus::Redeemed {
            return Err(ClaimError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(ClaimError::Expired);
        }
        if self.device_type != requested {
            return Err(ClaimError::TypeMismatch {
                expected: self.device_type,
                requested,
            });
        }
        Ok(())
    }

    /// Transition to `Redeemed`. Callers must have checked eligibility under
    /// the same lock or transaction.
    pub fn mark_redeemed(&mut self, device_id: DeviceId, now: i64) {
        self.status = ClaimStatus::Redeemed;
        self.redeemed_by = Some(device_id);
        self.redeemed_at = Some(now);
    }
}

impl DeviceId {
    /// Derive `"{type}-{code}-{unix seconds}"`, lowercased.
    pub fn derive(device_type: DeviceType, code: &Code, now: i64) -> Self {
        DeviceId::new(format!(
            "{}-{}-{}",
            device_type.as_str().to_lowercase(),
            code.as_str().to_lowercase(),
            now.div_euclid(1000)
        ))
    }
}
