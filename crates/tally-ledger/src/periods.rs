//! Reward-period records and lazy finalization.
//!
//! The ledger keeps one [`RewardPeriod`] per elapsed period plus a tentative
//! record for the period in progress. Every record before the last is final:
//! its `reward_per_period` never changes again.
//!
//! Stake totals are kept as a plain sum and a sum of weight units
//! (`balance · weight`). The weighted total of a period is
//! `plain + floor(units · multiplier / 1e6)`, which stays exact when the
//! multiplier changes. Distributed rewards are credited to the units series at
//! the period's `max_weight`, bounding every stakeholder's weighted share.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_core::config::LedgerConfig;
use tally_core::constants::MULTIPLIER_PRECISION;
use tally_core::error::LedgerError;
use tally_core::types::{Amount, Period};

use crate::math::mul_div;

/// Which of the two parallel stake series to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    Unweighted,
    Weighted,
}

/// Aggregate stake: plain balance and weight units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTotals {
    pub plain: Amount,
    pub units: Amount,
}

impl StakeTotals {
    /// Totals contributed by `balance` held at `weight`.
    pub fn of(balance: Amount, weight: u64) -> Result<Self, LedgerError> {
        let units = balance
            .checked_mul(weight as u128)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(Self { plain: balance, units })
    }

    /// Weighted total under `multiplier`.
    pub fn weighted(&self, multiplier: u128) -> Result<Amount, LedgerError> {
        let extra = mul_div(self.units, multiplier, MULTIPLIER_PRECISION).ok_or(LedgerError::ArithmeticOverflow)?;
        self.plain.checked_add(extra).ok_or(LedgerError::ArithmeticOverflow)
    }

    pub fn read(&self, series: Series, multiplier: u128) -> Result<Amount, LedgerError> {
        match series {
            Series::Unweighted => Ok(self.plain),
            Series::Weighted => self.weighted(multiplier),
        }
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, LedgerError> {
        Ok(Self {
            plain: self.plain.checked_add(other.plain).ok_or(LedgerError::ArithmeticOverflow)?,
            units: self.units.checked_add(other.units).ok_or(LedgerError::ArithmeticOverflow)?,
        })
    }

    pub fn saturating_sub(&self, other: &Self) -> Self {
        Self {
            plain: self.plain.saturating_sub(other.plain),
            units: self.units.saturating_sub(other.units),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.plain == 0 && self.units == 0
    }
}

/// One reward period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPeriod {
    /// Amount distributed over the period. Tentative until finalized.
    pub reward_per_period: Amount,
    /// Multiplier snapshot taken at finalization.
    pub extra_reward_multiplier: u128,
    /// Highest weight among active stakeholders.
    pub max_weight: u64,
    /// Confirmed, reward-earning stake at the start of the period.
    pub staking: StakeTotals,
    /// Rewards credited so far in the lock window containing this period.
    pub locked_rewards: Amount,
}

/// What the reward walk needs to know about one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodView {
    pub period: Period,
    pub reward_per_period: Amount,
    pub extra_reward_multiplier: u128,
    pub total_weighted: Amount,
}

/// All period records plus the stake deposited during the tentative period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLedger {
    periods: Vec<RewardPeriod>,
    new_stake: StakeTotals,
}

impl PeriodLedger {
    /// A ledger whose only record is the tentative period 0.
    pub fn new(extra_reward_multiplier: u128) -> Self {
        Self {
            periods: vec![RewardPeriod {
                extra_reward_multiplier,
                ..RewardPeriod::default()
            }],
            new_stake: StakeTotals::default(),
        }
    }

    /// Index of the tentative period.
    pub fn latest(&self) -> Period {
        (self.periods.len() - 1) as Period
    }

    pub fn get(&self, period: Period) -> Option<&RewardPeriod> {
        usize::try_from(period).ok().and_then(|i| self.periods.get(i))
    }

    pub fn latest_record(&self) -> &RewardPeriod {
        &self.periods[self.periods.len() - 1]
    }

    fn latest_mut(&mut self) -> &mut RewardPeriod {
        let last = self.periods.len() - 1;
        &mut self.periods[last]
    }

    /// Stake deposited during the tentative period, not yet earning.
    pub fn new_stake(&self) -> StakeTotals {
        self.new_stake
    }

    /// Funds owed to stakers: confirmed stake, new stake, and queued withdrawals.
    pub fn committed(&self, pending_withdrawals: Amount) -> Result<Amount, LedgerError> {
        self.latest_record()
            .staking
            .plain
            .checked_add(self.new_stake.plain)
            .and_then(|v| v.checked_add(pending_withdrawals))
            .ok_or(LedgerError::ArithmeticOverflow)
    }

    /// Finalize every period before `target`. Returns how many were finalized.
    ///
    /// `holdings` is the ledger's token balance; anything above
    /// [`committed`](Self::committed) is spread over the remaining horizon.
    pub fn finalize_through(
        &mut self,
        target: Period,
        holdings: Amount,
        pending_withdrawals: Amount,
        config: &LedgerConfig,
    ) -> Result<u64, LedgerError> {
        let mut finalized = 0;
        while self.latest() < target {
            self.finalize_latest(holdings, pending_withdrawals, config)?;
            finalized += 1;
        }
        Ok(finalized)
    }

    fn finalize_latest(
        &mut self,
        holdings: Amount,
        pending_withdrawals: Amount,
        config: &LedgerConfig,
    ) -> Result<(), LedgerError> {
        let period = self.latest();
        let undistributed = holdings.saturating_sub(self.committed(pending_withdrawals)?);
        let new_stake = self.new_stake;
        let max_periods = config.max_number_of_periods;

        let record = self.latest_mut();
        record.extra_reward_multiplier = config.extra_reward_multiplier;
        let weighted = record.staking.weighted(record.extra_reward_multiplier)?;
        let reward = if period >= max_periods || weighted == 0 {
            0
        } else {
            undistributed / (max_periods - period).max(1) as u128
        };
        record.reward_per_period = reward;

        let growth = StakeTotals::of(reward, record.max_weight)?;
        let next_locked = if config.lock_window(period + 1) != config.lock_window(period) {
            reward
        } else {
            record
                .locked_rewards
                .checked_add(reward)
                .ok_or(LedgerError::ArithmeticOverflow)?
        };
        let next = RewardPeriod {
            reward_per_period: reward,
            extra_reward_multiplier: record.extra_reward_multiplier,
            max_weight: record.max_weight,
            staking: record.staking.checked_add(&new_stake)?.checked_add(&growth)?,
            locked_rewards: next_locked,
        };
        self.periods.push(next);
        self.new_stake = StakeTotals::default();

        debug!(period, reward_per_period = %reward, undistributed = %undistributed, "periods: finalized");
        Ok(())
    }

    pub fn add_new_stake(&mut self, amount: Amount, weight: u64) -> Result<(), LedgerError> {
        self.new_stake = self.new_stake.checked_add(&StakeTotals::of(amount, weight)?)?;
        Ok(())
    }

    pub fn remove_new_stake(&mut self, amount: Amount, weight: u64) -> Result<(), LedgerError> {
        self.new_stake = self.new_stake.saturating_sub(&StakeTotals::of(amount, weight)?);
        Ok(())
    }

    /// Remove confirmed stake from the tentative period.
    pub fn remove_staking(&mut self, amount: Amount, weight: u64) -> Result<(), LedgerError> {
        let removed = StakeTotals::of(amount, weight)?;
        let record = self.latest_mut();
        record.staking = record.staking.saturating_sub(&removed);
        Ok(())
    }

    /// Move a stakeholder's balances from weight `from` to weight `to`.
    pub fn reweight(
        &mut self,
        staking_balance: Amount,
        new_stake: Amount,
        from: u64,
        to: u64,
    ) -> Result<(), LedgerError> {
        let record = self.latest_mut();
        record.staking = record
            .staking
            .saturating_sub(&StakeTotals::of(staking_balance, from)?)
            .checked_add(&StakeTotals::of(staking_balance, to)?)?;
        self.new_stake = self
            .new_stake
            .saturating_sub(&StakeTotals::of(new_stake, from)?)
            .checked_add(&StakeTotals::of(new_stake, to)?)?;
        Ok(())
    }

    pub fn set_latest_max_weight(&mut self, max_weight: u64) {
        self.latest_mut().max_weight = max_weight;
    }

    pub fn set_latest_multiplier(&mut self, multiplier: u128) {
        self.latest_mut().extra_reward_multiplier = multiplier;
    }

    /// Views of periods `from..to`, projecting past the tentative period.
    ///
    /// Projected periods assume the tentative reward repeats until the horizon
    /// and that nothing else is deposited or withdrawn.
    pub fn walk(&self, from: Period, to: Period, max_number_of_periods: u64) -> PeriodWalk<'_> {
        PeriodWalk {
            ledger: self,
            next: from,
            end: to,
            max_periods: max_number_of_periods,
            projection: None,
        }
    }
}

/// Reward a not-yet-final period would distribute.
fn effective_reward(period: Period, tentative: Amount, weighted: Amount, max_periods: u64) -> Amount {
    if period >= max_periods || weighted == 0 { 0 } else { tentative }
}

#[derive(Debug, Clone, Copy)]
struct Projection {
    period: Period,
    staking: StakeTotals,
    tentative_reward: Amount,
    multiplier: u128,
    max_weight: u64,
}

impl Projection {
    fn at_latest(ledger: &PeriodLedger) -> Self {
        let record = ledger.latest_record();
        Self {
            period: ledger.latest(),
            staking: record.staking,
            tentative_reward: record.reward_per_period,
            multiplier: record.extra_reward_multiplier,
            max_weight: record.max_weight,
        }
    }

    fn view(&self, max_periods: u64) -> Result<PeriodView, LedgerError> {
        let total_weighted = self.staking.weighted(self.multiplier)?;
        Ok(PeriodView {
            period: self.period,
            reward_per_period: effective_reward(self.period, self.tentative_reward, total_weighted, max_periods),
            extra_reward_multiplier: self.multiplier,
            total_weighted,
        })
    }

    fn advance(&mut self, deposited: StakeTotals, max_periods: u64) -> Result<(), LedgerError> {
        let reward = self.view(max_periods)?.reward_per_period;
        let growth = StakeTotals::of(reward, self.max_weight)?;
        self.staking = self.staking.checked_add(&deposited)?.checked_add(&growth)?;
        self.period += 1;
        Ok(())
    }
}

/// Iterator returned by [`PeriodLedger::walk`].
pub struct PeriodWalk<'a> {
    ledger: &'a PeriodLedger,
    next: Period,
    end: Period,
    max_periods: u64,
    projection: Option<Projection>,
}

impl PeriodWalk<'_> {
    fn view_at(&mut self, period: Period) -> Result<PeriodView, LedgerError> {
        let latest = self.ledger.latest();
        if period < latest {
            let record = &self.ledger.periods[period as usize];
            return Ok(PeriodView {
                period,
                reward_per_period: record.reward_per_period,
                extra_reward_multiplier: record.extra_reward_multiplier,
                total_weighted: record.staking.weighted(record.extra_reward_multiplier)?,
            });
        }

        let projection = self
            .projection
            .get_or_insert_with(|| Projection::at_latest(self.ledger));
        while projection.period < period {
            let deposited = if projection.period == latest {
                self.ledger.new_stake
            } else {
                StakeTotals::default()
            };
            projection.advance(deposited, self.max_periods)?;
        }
        projection.view(self.max_periods)
    }
}

impl Iterator for PeriodWalk<'_> {
    type Item = Result<PeriodView, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let period = self.next;
        self.next += 1;
        Some(self.view_at(period))
    }
}
