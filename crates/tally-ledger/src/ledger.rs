//! The staking ledger entry points.
//!
//! Every mutating call runs the period catch-up first, then applies its effect.
//! A call either applies fully or leaves the state exactly as it found it: the
//! state is checkpointed before the call and restored on any error. Token
//! transfers out of the ledger happen last, at most one per call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use tally_core::config::{validate_early_withdrawal_fee, validate_max_number_of_periods, LedgerConfig};
use tally_core::crypto::proof_digest;
use tally_core::error::{AuthError, InputError, LedgerError, TokenError};
use tally_core::traits::{Clock, TokenLedger, WeightAuthorizer};
use tally_core::types::{Address, Amount, Period, Timestamp};

use crate::clock::PeriodClock;
use crate::math::instant_fee;
use crate::periods::{PeriodLedger, RewardPeriod, Series};
use crate::rewards::{ClaimOutcome, RewardCalculation, RewardEngine};
use crate::stakeholder::Stakeholder;
use crate::weights::WeightHistogram;
use crate::withdrawal::{Payout, WithdrawalOutcome, WithdrawalRequest};

/// Everything a failed call must roll back.
#[derive(Debug, Clone)]
struct LedgerState {
    config: LedgerConfig,
    periods: PeriodLedger,
    stakeholders: BTreeMap<Address, Stakeholder>,
    weights: WeightHistogram,
    used_proofs: BTreeSet<[u8; 32]>,
    pending_withdrawals: Amount,
}

/// A single-token staking ledger.
///
/// `address` is the ledger's own account on the token; stakes are pulled into
/// it with `transfer_from` and payouts leave it with `transfer`. Anything the
/// account holds beyond what is owed to stakers is the reward pool.
pub struct StakingLedger {
    owner: Address,
    address: Address,
    clock: PeriodClock,
    token: Arc<dyn TokenLedger>,
    authorizer: Arc<dyn WeightAuthorizer>,
    time: Arc<dyn Clock>,
    state: LedgerState,
}

impl StakingLedger {
    /// Create a ledger whose period 0 starts now.
    pub fn new(
        config: LedgerConfig,
        owner: Address,
        address: Address,
        token: Arc<dyn TokenLedger>,
        authorizer: Arc<dyn WeightAuthorizer>,
        time: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let clock = PeriodClock::new(time.now(), config.reward_period_duration);
        info!(%owner, %address, start_time = clock.start_time(), "ledger: created");
        Ok(Self {
            owner,
            address,
            clock,
            token,
            authorizer,
            time,
            state: LedgerState {
                periods: PeriodLedger::new(config.extra_reward_multiplier),
                config,
                stakeholders: BTreeMap::new(),
                weights: WeightHistogram::new(),
                used_proofs: BTreeSet::new(),
                pending_withdrawals: 0,
            },
        })
    }

    // --- plumbing ---

    /// Run `op` against the ledger, restoring the prior state if it fails.
    fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T, LedgerError>) -> Result<T, LedgerError> {
        let checkpoint = self.state.clone();
        let result = op(self);
        if result.is_err() {
            self.state = checkpoint;
        }
        result
    }

    /// Read the clock once and finalize every elapsed period.
    fn begin(&mut self) -> Result<(Timestamp, Period), LedgerError> {
        let now = self.time.now();
        let current = self.clock.period_at(now);
        self.catch_up(current)?;
        Ok((now, current))
    }

    fn catch_up(&mut self, target: Period) -> Result<(), LedgerError> {
        if target <= self.state.periods.latest() {
            return Ok(());
        }
        let holdings = self.token.balance_of(&self.address);
        let finalized = self.state.periods.finalize_through(
            target,
            holdings,
            self.state.pending_withdrawals,
            &self.state.config,
        )?;
        debug!(finalized, latest = self.state.periods.latest(), "ledger: caught up");
        Ok(())
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), AuthError> {
        if *caller != self.owner {
            return Err(AuthError::NotOwner(*caller));
        }
        Ok(())
    }

    fn pay(&self, to: &Address, amount: Amount) -> Result<(), TokenError> {
        if amount == 0 {
            return Ok(());
        }
        if !self.token.transfer(&self.address, to, amount) {
            return Err(TokenError::TransferFailed { to: *to, amount });
        }
        Ok(())
    }

    fn refresh_max_weight(&mut self) {
        let max = self.state.weights.max();
        self.state.periods.set_latest_max_weight(max);
    }

    /// Settle `who`'s rewards up to `target`, compounding them into the
    /// staking balance. With `withdraw_to_wallet`, the unlocked part of the
    /// new reward is removed from the balance for the caller to transfer.
    fn settle(&mut self, who: &Address, target: Period, withdraw_to_wallet: bool) -> Result<ClaimOutcome, LedgerError> {
        let Some(sh) = self.state.stakeholders.get(who) else {
            return Ok(ClaimOutcome::default());
        };
        if target <= sh.last_claimed || !sh.is_active() {
            return Ok(ClaimOutcome::default());
        }

        let calc = RewardEngine::new(&self.state.periods, &self.state.config).calculate(sh, target)?;
        let config = &self.state.config;
        let locked = if config.lock_window(sh.last_claimed) == config.lock_window(target) {
            sh.locked_rewards
                .checked_add(calc.locked_rewards)
                .ok_or(LedgerError::ArithmeticOverflow)?
        } else {
            calc.locked_rewards
        };
        let paid = if withdraw_to_wallet {
            calc.reward - calc.locked_rewards
        } else {
            0
        };
        let balance = sh
            .staking_balance
            .checked_add(sh.new_stake)
            .and_then(|b| b.checked_add(calc.reward))
            .ok_or(LedgerError::ArithmeticOverflow)?
            - paid;
        let weight = sh.weight;

        if paid > 0 {
            self.state.periods.remove_staking(paid, weight)?;
        }
        let sh = self.state.stakeholders.entry(*who).or_default();
        sh.staking_balance = balance;
        sh.new_stake = 0;
        sh.locked_rewards = locked;
        sh.last_claimed = target;

        debug!(%who, target, reward = %calc.reward, locked = %locked, paid = %paid, "ledger: rewards settled");
        Ok(ClaimOutcome {
            reward: calc.reward,
            locked_rewards: locked,
            paid,
        })
    }

    /// Change `who`'s weight. Active stakeholders are settled first so past
    /// periods keep the old weight.
    fn apply_weight(&mut self, who: &Address, weight: u64, current: Period) -> Result<(), LedgerError> {
        let active = self.state.stakeholders.get(who).is_some_and(Stakeholder::is_active);
        if active {
            self.settle(who, current, false)?;
        }

        let sh = self.state.stakeholders.entry(*who).or_default();
        let old = sh.weight;
        if old == weight {
            return Ok(());
        }
        sh.weight = weight;
        let (staking_balance, new_stake) = (sh.staking_balance, sh.new_stake);

        if active {
            self.state.weights.shift(old, weight);
            self.refresh_max_weight();
            self.state.periods.reweight(staking_balance, new_stake, old, weight)?;
        }
        info!(%who, old, new = weight, active, "ledger: weight changed");
        Ok(())
    }

    // --- stakeholder entry points ---

    /// Deposit `amount` from `caller`. It starts earning next period.
    ///
    /// An active stakeholder's pending rewards are compounded first.
    pub fn stake(&mut self, caller: &Address, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(InputError::ZeroAmount.into());
        }
        self.transact(|ledger| {
            let (now, current) = ledger.begin()?;
            let active = ledger.state.stakeholders.get(caller).is_some_and(Stakeholder::is_active);
            if active {
                ledger.settle(caller, current, false)?;
            }

            let state = &mut ledger.state;
            let sh = state.stakeholders.entry(*caller).or_default();
            if !active {
                sh.last_claimed = current;
                sh.start_date = now;
                state.weights.add(sh.weight);
                info!(%caller, weight = sh.weight, "ledger: stakeholder activated");
            }
            sh.new_stake = sh.new_stake.checked_add(amount).ok_or(LedgerError::ArithmeticOverflow)?;
            let weight = sh.weight;
            state.periods.add_new_stake(amount, weight)?;
            ledger.refresh_max_weight();

            if !ledger.token.transfer_from(caller, &ledger.address, amount) {
                return Err(TokenError::TransferFromFailed { from: *caller, amount }.into());
            }
            debug!(%caller, amount = %amount, period = current, "ledger: staked");
            Ok(())
        })
    }

    /// Settle `caller`'s rewards up to `target`, optionally paying the
    /// unlocked part out.
    pub fn claim_rewards(
        &mut self,
        caller: &Address,
        target: Period,
        withdraw_to_wallet: bool,
    ) -> Result<ClaimOutcome, LedgerError> {
        self.transact(|ledger| {
            let (_, current) = ledger.begin()?;
            if target > current {
                return Err(InputError::FuturePeriod { target, current }.into());
            }
            let outcome = ledger.settle(caller, target, withdraw_to_wallet)?;
            ledger.pay(caller, outcome.paid)?;
            Ok(outcome)
        })
    }

    /// Withdraw up to `amount`; larger requests are clamped to what is
    /// withdrawable.
    ///
    /// Accrued rewards are always settled first. `claim_first` decides whether
    /// they count toward what may be withdrawn now; without it the cap is the
    /// balance held before settling.
    ///
    /// Stake still pending in the current period comes back immediately and
    /// without fee. Earning stake is either paid now minus the instant fee or
    /// queued until the cooldown passes. It stops earning either way.
    pub fn request_withdrawal(
        &mut self,
        caller: &Address,
        amount: Amount,
        instant: bool,
        claim_first: bool,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        if amount == 0 {
            return Err(InputError::ZeroAmount.into());
        }
        self.transact(|ledger| {
            let (now, current) = ledger.begin()?;
            let Some(stale_cap) = ledger.state.stakeholders.get(caller).map(Stakeholder::withdrawable) else {
                return Ok(WithdrawalOutcome::default());
            };
            ledger.settle(caller, current, false)?;

            let fee_rate = ledger.state.config.early_withdrawal_fee;
            let cooldown = ledger.state.config.cooldown;
            let state = &mut ledger.state;
            let Some(sh) = state.stakeholders.get_mut(caller) else {
                return Ok(WithdrawalOutcome::default());
            };
            let cap = if claim_first {
                sh.withdrawable()
            } else {
                sh.withdrawable().min(stale_cap)
            };
            let amount = amount.min(cap);
            if amount == 0 {
                return Ok(WithdrawalOutcome::default());
            }

            // Settled to `current`, so any new stake left is still pending.
            let immediate = amount.min(sh.new_stake);
            let earning = amount - immediate;
            sh.new_stake -= immediate;
            sh.staking_balance -= earning;

            let mut outcome = WithdrawalOutcome {
                withdrawn: amount,
                paid: immediate,
                ..WithdrawalOutcome::default()
            };
            if earning > 0 {
                if instant {
                    outcome.fee = instant_fee(earning, fee_rate)?;
                    outcome.paid += earning - outcome.fee;
                } else {
                    sh.withdrawals.push(WithdrawalRequest {
                        release_date: now.saturating_add(cooldown),
                        release_amount: earning,
                        fee_rate,
                        cooldown,
                    });
                    outcome.queued_index = Some(sh.withdrawals.len() - 1);
                    state.pending_withdrawals = state
                        .pending_withdrawals
                        .checked_add(earning)
                        .ok_or(LedgerError::ArithmeticOverflow)?;
                }
            }

            let weight = sh.weight;
            let deactivated = !sh.is_active();
            if deactivated {
                sh.start_date = 0;
                state.weights.remove(weight);
            }
            state.periods.remove_new_stake(immediate, weight)?;
            state.periods.remove_staking(earning, weight)?;
            if deactivated {
                ledger.refresh_max_weight();
                info!(%caller, "ledger: stakeholder deactivated");
            }

            ledger.pay(caller, outcome.paid)?;
            info!(
                %caller,
                withdrawn = %outcome.withdrawn,
                paid = %outcome.paid,
                fee = %outcome.fee,
                queued = outcome.queued_index.is_some(),
                "ledger: withdrawal requested"
            );
            Ok(outcome)
        })
    }

    /// Release queued request `index`. Later requests shift down by one.
    pub fn withdraw_funds(&mut self, caller: &Address, index: usize) -> Result<Payout, LedgerError> {
        self.transact(|ledger| {
            let (now, _) = ledger.begin()?;
            let state = &mut ledger.state;
            let len = state.stakeholders.get(caller).map_or(0, |sh| sh.withdrawals.len());
            let Some(sh) = state.stakeholders.get_mut(caller).filter(|_| index < len) else {
                return Err(InputError::InvalidRequestIndex { index, len }.into());
            };

            let request = sh.withdrawals.remove(index);
            let fee = request.fee_at(now)?;
            let payout = Payout {
                amount: request.release_amount - fee,
                fee,
            };
            state.pending_withdrawals = state.pending_withdrawals.saturating_sub(request.release_amount);

            ledger.pay(caller, payout.amount)?;
            info!(%caller, index, amount = %payout.amount, fee = %payout.fee, "ledger: withdrawal released");
            Ok(payout)
        })
    }

    /// Raise `caller`'s weight with a proof from the weight authorizer.
    pub fn increase_weight(&mut self, caller: &Address, weight: u64, proof: &[u8]) -> Result<(), LedgerError> {
        self.transact(|ledger| {
            let (_, current) = ledger.begin()?;
            if !ledger.authorizer.verify(&ledger.address, caller, weight, proof) {
                return Err(AuthError::InvalidProof { subject: *caller, weight }.into());
            }
            let digest = proof_digest(proof);
            if ledger.state.used_proofs.contains(&digest) {
                return Err(AuthError::ProofReused.into());
            }
            let held = ledger.state.stakeholders.get(caller).map_or(0, |sh| sh.weight);
            if weight <= held {
                return Err(AuthError::WeightNotIncreased {
                    current: held,
                    requested: weight,
                }
                .into());
            }
            ledger.state.used_proofs.insert(digest);
            ledger.apply_weight(caller, weight, current)
        })
    }

    /// Finalize elapsed periods up to `target`, never past the current period.
    /// Returns the latest period afterwards.
    pub fn handle_new_period(&mut self, target: Period) -> Result<Period, LedgerError> {
        self.transact(|ledger| {
            let current = ledger.current_period();
            ledger.catch_up(target.min(current))?;
            Ok(ledger.state.periods.latest())
        })
    }

    /// Whether a keeper call would finalize anything.
    pub fn upkeep_needed(&self) -> bool {
        self.state.periods.latest() < self.current_period()
    }

    /// Keeper hook: finalize every elapsed period if any are pending.
    pub fn perform_upkeep(&mut self) -> Result<bool, LedgerError> {
        if !self.upkeep_needed() {
            return Ok(false);
        }
        let current = self.current_period();
        self.handle_new_period(current)?;
        Ok(true)
    }

    // --- owner entry points ---

    /// Set weights for a batch of addresses. Lowering is allowed.
    pub fn update_weight_batch(
        &mut self,
        caller: &Address,
        addresses: &[Address],
        weights: &[u64],
    ) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        if addresses.len() != weights.len() {
            return Err(InputError::LengthMismatch {
                addresses: addresses.len(),
                weights: weights.len(),
            }
            .into());
        }
        self.transact(|ledger| {
            let (_, current) = ledger.begin()?;
            for (who, &weight) in addresses.iter().zip(weights) {
                ledger.apply_weight(who, weight, current)?;
            }
            Ok(())
        })
    }

    pub fn set_max_number_of_periods(&mut self, caller: &Address, periods: u64) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        validate_max_number_of_periods(periods)?;
        self.transact(|ledger| {
            ledger.begin()?;
            ledger.state.config.max_number_of_periods = periods;
            info!(periods, "ledger: max number of periods updated");
            Ok(())
        })
    }

    /// Also rewrites the tentative period's multiplier snapshot.
    pub fn set_extra_reward_multiplier(&mut self, caller: &Address, multiplier: u128) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        self.transact(|ledger| {
            ledger.begin()?;
            ledger.state.config.extra_reward_multiplier = multiplier;
            ledger.state.periods.set_latest_multiplier(multiplier);
            info!(multiplier = %multiplier, "ledger: extra reward multiplier updated");
            Ok(())
        })
    }

    /// Applies to requests made from now on.
    pub fn set_cooldown(&mut self, caller: &Address, cooldown: u64) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        self.transact(|ledger| {
            ledger.begin()?;
            ledger.state.config.cooldown = cooldown;
            info!(cooldown, "ledger: cooldown updated");
            Ok(())
        })
    }

    pub fn set_early_withdrawal_fee(&mut self, caller: &Address, fee: u128) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        validate_early_withdrawal_fee(fee)?;
        self.transact(|ledger| {
            ledger.begin()?;
            ledger.state.config.early_withdrawal_fee = fee;
            info!(fee = %fee, "ledger: early withdrawal fee updated");
            Ok(())
        })
    }

    /// Replace the verifier for self-service weight increases.
    pub fn set_authorizer(&mut self, caller: &Address, authorizer: Arc<dyn WeightAuthorizer>) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        self.authorizer = authorizer;
        info!("ledger: weight authorizer replaced");
        Ok(())
    }

    /// Pay up to `amount` of the uncommitted surplus to the owner. Returns the
    /// amount paid.
    pub fn withdraw_remaining_funds(&mut self, caller: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.ensure_owner(caller)?;
        self.transact(|ledger| {
            ledger.begin()?;
            let paid = amount.min(ledger.surplus()?);
            ledger.pay(caller, paid)?;
            info!(requested = %amount, paid = %paid, "ledger: remaining funds withdrawn");
            Ok(paid)
        })
    }

    // --- queries ---

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.state.config
    }

    pub fn start_time(&self) -> Timestamp {
        self.clock.start_time()
    }

    pub fn current_period(&self) -> Period {
        self.clock.period_at(self.time.now())
    }

    /// The tentative period; every period before it is final.
    pub fn latest_reward_period(&self) -> Period {
        self.state.periods.latest()
    }

    pub fn reward_period(&self, period: Period) -> Option<&RewardPeriod> {
        self.state.periods.get(period)
    }

    pub fn stakeholder(&self, who: &Address) -> Option<&Stakeholder> {
        self.state.stakeholders.get(who)
    }

    pub fn is_active(&self, who: &Address) -> bool {
        self.stakeholder(who).is_some_and(Stakeholder::is_active)
    }

    pub fn withdrawal(&self, who: &Address, index: usize) -> Option<&WithdrawalRequest> {
        self.stakeholder(who).and_then(|sh| sh.withdrawals.get(index))
    }

    pub fn withdrawal_count(&self, who: &Address) -> usize {
        self.stakeholder(who).map_or(0, |sh| sh.withdrawals.len())
    }

    /// Number of active stakeholders holding `weight`.
    pub fn weight_count(&self, weight: u64) -> u64 {
        self.state.weights.count(weight)
    }

    /// Confirmed stake at the start of `period`; 0 for periods not yet recorded.
    pub fn total_staking_balance(&self, period: Period, series: Series) -> Result<Amount, LedgerError> {
        match self.state.periods.get(period) {
            Some(record) => record.staking.read(series, record.extra_reward_multiplier),
            None => Ok(0),
        }
    }

    /// Stake deposited during the tentative period.
    pub fn total_new_stake(&self, series: Series) -> Result<Amount, LedgerError> {
        let multiplier = self.state.periods.latest_record().extra_reward_multiplier;
        self.state.periods.new_stake().read(series, multiplier)
    }

    /// Rewards credited in the lock window containing `period`, up to it.
    pub fn total_locked_rewards(&self, period: Period) -> Amount {
        self.state.periods.get(period).map_or(0, |record| record.locked_rewards)
    }

    /// Funds queued for cooldown withdrawals.
    pub fn pending_withdrawals(&self) -> Amount {
        self.state.pending_withdrawals
    }

    /// Holdings not owed to any stakeholder.
    pub fn surplus(&self) -> Result<Amount, LedgerError> {
        let committed = self.state.periods.committed(self.state.pending_withdrawals)?;
        Ok(self.token.balance_of(&self.address).saturating_sub(committed))
    }

    /// Rewards `who` would settle at `target`. Pure; targets past the current
    /// period are forecasts.
    pub fn calculate_rewards(&self, who: &Address, target: Period) -> Result<RewardCalculation, LedgerError> {
        match self.stakeholder(who) {
            Some(sh) => RewardEngine::new(&self.state.periods, &self.state.config).calculate(sh, target),
            None => Ok(RewardCalculation::default()),
        }
    }
}
