//! Reward calculation.
//!
//! Rewards are accrued one period at a time against a running balance, so each
//! period's share compounds into the next. The walk is deliberately
//! sequential: the truncation of every period's share is part of the result.

use serde::{Deserialize, Serialize};

use tally_core::config::LedgerConfig;
use tally_core::error::LedgerError;
use tally_core::types::{Amount, Period};

use crate::math::{mul_div, weighted_stake};
use crate::periods::PeriodLedger;
use crate::stakeholder::Stakeholder;

/// Rewards accrued over a walk. `locked_rewards` is part of `reward`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCalculation {
    pub reward: Amount,
    pub locked_rewards: Amount,
}

/// Result of settling a stakeholder's rewards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    /// Reward accrued since the previous claim.
    pub reward: Amount,
    /// Locked part of the stakeholder's balance after the claim.
    pub locked_rewards: Amount,
    /// Transferred to the stakeholder's wallet.
    pub paid: Amount,
}

pub struct RewardEngine<'a> {
    periods: &'a PeriodLedger,
    config: &'a LedgerConfig,
}

impl<'a> RewardEngine<'a> {
    pub fn new(periods: &'a PeriodLedger, config: &'a LedgerConfig) -> Self {
        Self { periods, config }
    }

    /// Rewards `stakeholder` accrues from `last_claimed` up to `target`.
    ///
    /// Step `s` credits the reward of period `s - 1` and is locked iff
    /// `s / K == target / K`. Targets past the tentative period are projected.
    pub fn calculate(&self, stakeholder: &Stakeholder, target: Period) -> Result<RewardCalculation, LedgerError> {
        let start = stakeholder.last_claimed;
        if target <= start || !stakeholder.is_active() {
            return Ok(RewardCalculation::default());
        }

        // Periods at or past the horizon pay nothing unless already finalized.
        let horizon = self.config.max_number_of_periods.max(self.periods.latest());
        let end = target.min(horizon);
        let target_window = self.config.lock_window(target);
        let mut balance = stakeholder.staking_balance;
        let mut calc = RewardCalculation::default();

        for view in self.periods.walk(start, end, self.config.max_number_of_periods) {
            let view = view?;
            if balance > 0 && view.reward_per_period > 0 && view.total_weighted > 0 {
                let stake = weighted_stake(balance, stakeholder.weight, view.extra_reward_multiplier)?;
                let share = mul_div(view.reward_per_period, stake.min(view.total_weighted), view.total_weighted)
                    .ok_or(LedgerError::ArithmeticOverflow)?;

                balance = balance.checked_add(share).ok_or(LedgerError::ArithmeticOverflow)?;
                calc.reward = calc.reward.checked_add(share).ok_or(LedgerError::ArithmeticOverflow)?;
                if self.config.lock_window(view.period + 1) == target_window {
                    calc.locked_rewards += share;
                }
            }
            if view.period == start {
                balance = balance
                    .checked_add(stakeholder.new_stake)
                    .ok_or(LedgerError::ArithmeticOverflow)?;
            }
        }

        Ok(calc)
    }
}
