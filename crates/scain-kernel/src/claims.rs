//! Claim-code lifecycle: issuance, redemption, audit.
//!
//! Codes move `Issued -> Redeemed` exactly once. The transition itself is a
//! single conditional update in the store, so concurrent redeemers (in this
//! process or another one sharing the database) see at most one success.

use std::sync::Arc;
use std::time::Duration;

use scain_kernel_core::{now_millis, ClaimCode, Code, DeviceId, DeviceType};
use scain_kernel_store::{ClaimCodeStore, InsertResult, RedeemOutcome};

use crate::config::ClaimsConfig;
use crate::error::{bounded, KernelError, Result};

/// Issues and redeems claim codes against a [`ClaimCodeStore`].
pub struct ClaimCodeLifecycle {
    store: Arc<dyn ClaimCodeStore>,
    config: ClaimsConfig,
    store_timeout: Duration,
    generate: fn() -> Code,
}

impl ClaimCodeLifecycle {
    pub fn new(store: Arc<dyn ClaimCodeStore>, config: ClaimsConfig, store_timeout: Duration) -> Self {
        Self {
            store,
            config,
            store_timeout,
            generate: Code::generate,
        }
    }

    /// Replace the code source. Used to force collisions in tests.
    pub fn with_generator(mut self, generate: fn() -> Code) -> Self {
        self.generate = generate;
        self
    }

    /// Issue `count` fresh codes for `device_type`, valid for `ttl` if given.
    pub async fn issue(
        &self,
        device_type: DeviceType,
        count: usize,
        ttl: Option<Duration>,
    ) -> Result<Vec<ClaimCode>> {
        self.issue_at(device_type, count, ttl, now_millis()).await
    }

    /// [`issue`](Self::issue) with an explicit clock.
    pub async fn issue_at(
        &self,
        device_type: DeviceType,
        count: usize,
        ttl: Option<Duration>,
        now: i64,
    ) -> Result<Vec<ClaimCode>> {
        if !device_type.is_claimable() {
            return Err(KernelError::InvalidOperation(format!(
                "{device_type} is a data source and cannot be claimed"
            )));
        }
        if count == 0 || count > self.config.max_batch {
            return Err(KernelError::InvalidOperation(format!(
                "count must be between 1 and {}, got {count}",
                self.config.max_batch
            )));
        }

        let expires_at = ttl.map(|ttl| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now.saturating_add(ttl_ms)
        });

        let mut issued = Vec::with_capacity(count);
        for _ in 0..count {
            issued.push(self.issue_one(device_type, now, expires_at).await?);
        }

        tracing::info!(
            device_type = %device_type,
            count,
            expires_at = ?expires_at,
            "issued claim codes"
        );
        Ok(issued)
    }

    async fn issue_one(
        &self,
        device_type: DeviceType,
        now: i64,
        expires_at: Option<i64>,
    ) -> Result<ClaimCode> {
        let attempts = self.config.max_generation_attempts.max(1);

        for attempt in 1..=attempts {
            let claim = ClaimCode::issued((self.generate)(), device_type, now, expires_at);
            match bounded(self.store_timeout, self.store.insert_claim_code(&claim)).await? {
                InsertResult::Inserted => return Ok(claim),
                InsertResult::AlreadyExists => {
                    tracing::debug!(attempt, code = %claim.code, "claim code collision, regenerating");
                }
            }
        }

        tracing::error!(attempts, "claim code space exhausted");
        Err(KernelError::CodeSpaceExhausted { attempts })
    }

    /// Redeem `code` for `device_id`.
    ///
    /// The format is checked before any store access. Failures come back as
    /// [`KernelError::Claim`].
    ///
    /// [`KernelError::StoreTimeout`] leaves the outcome unknown: the store may
    /// have committed the redemption after the caller stopped waiting. Look the
    /// code up with [`get`](Self::get) and compare `redeemed_by` before
    /// treating a later `AlreadyUsed` as someone else's claim.
    pub async fn redeem(
        &self,
        code: &str,
        requested: DeviceType,
        device_id: DeviceId,
        now: i64,
    ) -> Result<DeviceId> {
        let code = Code::parse(code)?;

        let outcome = bounded(
            self.store_timeout,
            self.store.redeem_claim_code(&code, requested, &device_id, now),
        )
        .await?;

        match outcome {
            RedeemOutcome::Redeemed(claim) => {
                tracing::info!(
                    code = %claim.code,
                    device_type = %claim.device_type,
                    device_id = %device_id,
                    "claim code redeemed"
                );
                Ok(device_id)
            }
            RedeemOutcome::Rejected(reason) => {
                tracing::debug!(code = %code, requested = %requested, reason = %reason, "redemption rejected");
                Err(reason.into())
            }
        }
    }

    /// Redeem `code` with a device id derived from the type, code and clock.
    pub async fn claim_device(&self, code: &str, requested: DeviceType, now: i64) -> Result<DeviceId> {
        let parsed = Code::parse(code)?;
        let device_id = DeviceId::derive(requested, &parsed, now);
        self.redeem(parsed.as_str(), requested, device_id, now).await
    }

    /// Look up a code.
    pub async fn get(&self, code: &str) -> Result<Option<ClaimCode>> {
        let code = Code::parse(code)?;
        bounded(self.store_timeout, self.store.get_claim_code(&code)).await
    }

    /// All codes, optionally for one device type, oldest first.
    pub async fn list(&self, device_type: Option<DeviceType>) -> Result<Vec<ClaimCode>> {
        bounded(self.store_timeout, self.store.list_claim_codes(device_type)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scain_kernel_core::{ClaimError, ClaimStatus};
    use scain_kernel_store::MemoryStore;

    fn lifecycle() -> ClaimCodeLifecycle {
        ClaimCodeLifecycle::new(
            Arc::new(MemoryStore::new()),
            ClaimsConfig::default(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_issue_batch() {
        let claims = lifecycle();
        let codes = claims.issue_at(DeviceType::LoRaWan, 5, None, 1_000).await.unwrap();

        assert_eq!(codes.len(), 5);
        for c in &codes {
            assert_eq!(c.status, ClaimStatus::Issued);
            assert_eq!(c.device_type, DeviceType::LoRaWan);
            assert_eq!(c.issued_at, 1_000);
            assert!(c.expires_at.is_none());
        }
        assert_eq!(claims.list(None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_ttl_sets_expiry() {
        let claims = lifecycle();
        let codes = claims
            .issue_at(DeviceType::Esp32, 1, Some(Duration::from_secs(60)), 1_000)
            .await
            .unwrap();
        assert_eq!(codes[0].expires_at, Some(61_000));
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_requests() {
        let claims = lifecycle();

        assert!(matches!(
            claims.issue_at(DeviceType::Erp, 1, None, 0).await,
            Err(KernelError::InvalidOperation(_))
        ));
        assert!(matches!(
            claims.issue_at(DeviceType::Esp32, 0, None, 0).await,
            Err(KernelError::InvalidOperation(_))
        ));
        assert!(matches!(
            claims.issue_at(DeviceType::Esp32, 1001, None, 0).await,
            Err(KernelError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_collisions_exhaust_code_space() {
        let claims = lifecycle().with_generator(|| Code::parse("AAAAAAAA").unwrap());

        claims.issue_at(DeviceType::Esp32, 1, None, 0).await.unwrap();
        let second = claims.issue_at(DeviceType::Esp32, 1, None, 0).await;
        assert!(matches!(
            second,
            Err(KernelError::CodeSpaceExhausted { attempts: 10 })
        ));
    }

    #[tokio::test]
    async fn test_malformed_code_is_rejected_before_store() {
        let claims = lifecycle();
        let err = claims
            .redeem("abc", DeviceType::Esp32, DeviceId::from("d"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err.as_claim(), Some(ClaimError::MalformedCode(_))));
    }

    #[tokio::test]
    async fn test_claim_device_derives_id() {
        let claims = lifecycle();
        let code = claims.issue_at(DeviceType::Tracker, 1, None, 0).await.unwrap().remove(0);

        let id = claims
            .claim_device(code.code.as_str(), DeviceType::Tracker, 1_700_000_000_999)
            .await
            .unwrap();
        assert_eq!(
            id.as_str(),
            format!("tracker-{}-1700000000", code.code.as_str().to_lowercase())
        );

        let stored = claims.get(code.code.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.redeemed_by, Some(id));
    }
}
