//! Configuration for the kernel.

use std::time::Duration;

use scain_kernel_anchor::AnchorConfig;
use scain_kernel_core::HashAlgorithm;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct ScainConfig {
    /// Algorithm used for newly recorded events.
    pub hash_algorithm: HashAlgorithm,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Claim-code issuance limits.
    pub claims: ClaimsConfig,
    /// Background anchoring.
    pub anchor: AnchorConfig,
}

impl Default for ScainConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha256,
            store_timeout: Duration::from_secs(5),
            claims: ClaimsConfig::default(),
            anchor: AnchorConfig::default(),
        }
    }
}

/// Claim-code issuance limits.
#[derive(Debug, Clone)]
pub struct ClaimsConfig {
    /// Fresh codes drawn per slot before giving up on collisions.
    pub max_generation_attempts: u32,
    /// Largest `count` accepted by a single `issue` call.
    pub max_batch: usize,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: 10,
            max_batch: 1000,
        }
    }
}
