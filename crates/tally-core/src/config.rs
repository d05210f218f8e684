//! Ledger configuration.
//!
//! [`LedgerConfig`] holds the tunables fixed at construction. The owner may
//! later adjust the horizon, multiplier, cooldown, and fee rate; the period
//! duration and lock window stay fixed for the ledger's lifetime.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COOLDOWN, DEFAULT_EARLY_WITHDRAWAL_FEE, DEFAULT_EXTRA_REWARD_MULTIPLIER,
    DEFAULT_MAX_NUMBER_OF_PERIODS, DEFAULT_PERIODS_FOR_EXTRA_REWARD,
    DEFAULT_REWARD_PERIOD_DURATION, FEE_PRECISION,
};
use crate::error::InputError;

/// Configuration for a staking ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of periods over which the reward pool is spread.
    pub max_number_of_periods: u64,
    /// Length of one reward period in seconds.
    pub reward_period_duration: u64,
    /// Lock window in periods; rewards unlock when a window boundary passes.
    pub periods_for_extra_reward: u64,
    /// Weight multiplier, fixed point over `MULTIPLIER_PRECISION`.
    pub extra_reward_multiplier: u128,
    /// Cooldown in seconds before a queued withdrawal matures.
    pub cooldown: u64,
    /// Instant-withdrawal fee rate over `FEE_PRECISION`.
    pub early_withdrawal_fee: u128,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_number_of_periods: DEFAULT_MAX_NUMBER_OF_PERIODS,
            reward_period_duration: DEFAULT_REWARD_PERIOD_DURATION,
            periods_for_extra_reward: DEFAULT_PERIODS_FOR_EXTRA_REWARD,
            extra_reward_multiplier: DEFAULT_EXTRA_REWARD_MULTIPLIER,
            cooldown: DEFAULT_COOLDOWN,
            early_withdrawal_fee: DEFAULT_EARLY_WITHDRAWAL_FEE,
        }
    }
}

impl LedgerConfig {
    /// Check every field is usable.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.reward_period_duration == 0 {
            return Err(InputError::InvalidConfig("reward_period_duration must be positive".into()));
        }
        if self.periods_for_extra_reward == 0 {
            return Err(InputError::InvalidConfig("periods_for_extra_reward must be positive".into()));
        }
        validate_max_number_of_periods(self.max_number_of_periods)?;
        validate_early_withdrawal_fee(self.early_withdrawal_fee)?;
        Ok(())
    }

    /// Lock-window index of `period`.
    pub fn lock_window(&self, period: u64) -> u64 {
        period / self.periods_for_extra_reward.max(1)
    }
}

/// The horizon must cover at least one period.
pub fn validate_max_number_of_periods(periods: u64) -> Result<(), InputError> {
    if periods == 0 {
        return Err(InputError::InvalidConfig("max_number_of_periods must be positive".into()));
    }
    Ok(())
}

/// The fee rate cannot exceed 100%.
pub fn validate_early_withdrawal_fee(fee: u128) -> Result<(), InputError> {
    if fee > FEE_PRECISION {
        return Err(InputError::InvalidConfig(format!(
            "early_withdrawal_fee {fee} exceeds {FEE_PRECISION}"
        )));
    }
    Ok(())
}
