//! Digests over the canonical encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::canonical::CanonicalEncoder;
use crate::error::{CoreError, EncodingError};
use crate::value::Value;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Digest size in bytes.
    pub const fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Length of the hex form of a digest.
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Hash raw bytes.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CoreError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Computes and checks hex digests of canonically encoded values.
///
/// Every call re-encodes the value; nothing is cached here.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher {
    encoder: CanonicalEncoder,
}

impl Hasher {
    pub const fn new() -> Self {
        Self {
            encoder: CanonicalEncoder::new(),
        }
    }

    /// Lowercase hex digest of the canonical encoding of `value`.
    pub fn compute(&self, value: &Value, algorithm: HashAlgorithm) -> Result<String, EncodingError> {
        let bytes = self.encoder.encode(value)?;
        Ok(hex::encode(algorithm.digest(&bytes)))
    }

    /// Check `value` against an expected hex digest.
    ///
    /// Never fails: a digest of the wrong length, non-hex input, or a value
    /// that cannot be encoded all yield `false`.
    pub fn verify(&self, value: &Value, expected: &str, algorithm: HashAlgorithm) -> bool {
        if expected.len() != algorithm.hex_len() {
            return false;
        }
        let Ok(expected) = hex::decode(expected) else {
            return false;
        };
        match self.encoder.encode(value) {
            Ok(bytes) => algorithm.digest(&bytes) == expected,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::record()
            .field("a", 1)
            .field("b", Value::sequence([1, 2]))
            .build()
    }

    #[test]
    fn test_known_digest() {
        // sha256(b"null")
        let h = Hasher::new().compute(&Value::Null, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            h,
            "74234e98afe7498fb5daf1f36ac2d78acc339464f950703b8c019892f982b90b"
        );
    }

    #[test]
    fn test_output_lengths() {
        let hasher = Hasher::new();
        assert_eq!(hasher.compute(&sample(), HashAlgorithm::Sha256).unwrap().len(), 64);
        assert_eq!(hasher.compute(&sample(), HashAlgorithm::Sha512).unwrap().len(), 128);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hasher = Hasher::new();
        for alg in [HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
            let h = hasher.compute(&sample(), alg).unwrap();
            assert!(hasher.verify(&sample(), &h, alg));
            assert!(hasher.verify(&sample(), &h.to_uppercase(), alg));
        }
    }

    #[test]
    fn test_verify_rejects_changed_value() {
        let hasher = Hasher::new();
        let h = hasher.compute(&sample(), HashAlgorithm::Sha256).unwrap();
        let changed = Value::record()
            .field("a", 2)
            .field("b", Value::sequence([1, 2]))
            .build();
        assert!(!hasher.verify(&changed, &h, HashAlgorithm::Sha256));
    }

    #[test]
    fn test_verify_never_fails_on_bad_input() {
        let hasher = Hasher::new();
        let h256 = hasher.compute(&sample(), HashAlgorithm::Sha256).unwrap();

        // Algorithm / length mismatch
        assert!(!hasher.verify(&sample(), &h256, HashAlgorithm::Sha512));
        // Not hex
        assert!(!hasher.verify(&sample(), &"zz".repeat(32), HashAlgorithm::Sha256));
        // Empty
        assert!(!hasher.verify(&sample(), "", HashAlgorithm::Sha256));
        // Unencodable value
        assert!(!hasher.verify(&Value::Float(f64::NAN), &h256, HashAlgorithm::Sha256));
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA-512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
