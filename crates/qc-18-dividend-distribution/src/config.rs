//! Configuration for the Dividend Distribution subsystem

use crate::domain::{AccountId, ControllerKey, DividendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base denomination: one VBC in base units.
pub const DEFAULT_CURRENCY_UNIT: u64 = 1_000_000;

/// Dividend configuration.
///
/// Every validator must run with identical numeric parameters, otherwise
/// result hashes diverge.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DividendConfig {
    /// Base denomination used by the cube-root dampening.
    pub currency_unit: u64,
    /// Minimum holding for rank/spread participation. Also the decay breakpoint.
    pub min_qualifying_holding: u64,
    /// VBC payouts below this are zeroed and returned to the remainder pool.
    pub min_vbc_payout: u64,
    /// Zero-payout records are still emitted above this spread.
    pub fee_share_spread_threshold: u64,
    /// Coin growth per round: holding * numerator / denominator.
    pub coin_growth_numerator: u64,
    pub coin_growth_denominator: u64,
    /// Hex account id that receives all rounding remainders.
    pub remainder_account: String,
    /// Hex Ed25519 public key of the round controller.
    pub controller_public_key: Option<String>,
    /// Default number of Apply instructions per submission burst.
    pub submit_batch_limit: usize,
    /// Attempts per step when storage is unavailable.
    pub storage_retry_attempts: u32,
    pub storage_retry_initial_delay_ms: u64,
    pub storage_retry_max_delay_ms: u64,
}

impl Default for DividendConfig {
    fn default() -> Self {
        Self {
            currency_unit: DEFAULT_CURRENCY_UNIT,
            min_qualifying_holding: 1_000 * DEFAULT_CURRENCY_UNIT,
            min_vbc_payout: 1_000,
            fee_share_spread_threshold: 10_000 * DEFAULT_CURRENCY_UNIT,
            coin_growth_numerator: 5,
            coin_growth_denominator: 1_000,
            remainder_account: hex::encode([0u8; 20]),
            controller_public_key: None,
            submit_batch_limit: 256,
            storage_retry_attempts: 5,
            storage_retry_initial_delay_ms: 50,
            storage_retry_max_delay_ms: 500,
        }
    }
}

impl DividendConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), DividendError> {
        if self.currency_unit == 0 {
            return Err(DividendError::malformed("currency_unit must be non-zero"));
        }
        if self.coin_growth_denominator == 0 {
            return Err(DividendError::malformed(
                "coin_growth_denominator must be non-zero",
            ));
        }
        if self.submit_batch_limit == 0 {
            return Err(DividendError::malformed("submit_batch_limit must be non-zero"));
        }
        self.remainder_account()?;
        if let Some(key) = &self.controller_public_key {
            ControllerKey::from_hex(key)?;
        }
        Ok(())
    }

    /// Validate for a node that will accept round transactions.
    pub fn validate_for_production(&self) -> Result<(), DividendError> {
        self.validate()?;
        if self.controller_public_key.is_none() {
            return Err(DividendError::Unauthorized(
                "controller_public_key must be configured".into(),
            ));
        }
        Ok(())
    }

    pub fn remainder_account(&self) -> Result<AccountId, DividendError> {
        let raw = hex::decode(self.remainder_account.trim()).map_err(|e| {
            DividendError::malformed(format!("remainder_account is not hex: {e}"))
        })?;
        raw.try_into()
            .map_err(|_| DividendError::malformed("remainder_account must be 20 bytes"))
    }

    pub fn controller_key(&self) -> Result<Option<ControllerKey>, DividendError> {
        self.controller_public_key
            .as_deref()
            .map(ControllerKey::from_hex)
            .transpose()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.storage_retry_attempts.max(1),
            initial_delay: Duration::from_millis(self.storage_retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.storage_retry_max_delay_ms),
        }
    }
}

/// Exponential backoff for `StorageUnavailable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
