//! Scenario files and the simulation that replays them.
//!
//! A scenario is a JSON document with a list of steps. Accounts are named by
//! label; each label maps to [`Address::from_label`]. Steps that the ledger
//! rejects are recorded in the report and the run continues.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tally_core::crypto::GrantSigner;
use tally_core::error::LedgerError;
use tally_core::traits::{Clock as _, TokenLedger as _};
use tally_core::types::{Address, Amount, Period};
use tally_ledger::memory::{ManualClock, MemoryToken};
use tally_ledger::{ClaimOutcome, Payout, RewardCalculation, StakingLedger, WithdrawalOutcome};

use crate::config::SimConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid scenario {}", path.display()))
    }
}

/// One scenario action. Amounts are whole base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Add tokens to the reward pool.
    Fund { amount: u64 },
    /// Mint, approve, and stake in one go.
    Stake { who: String, amount: u64 },
    /// Move the clock forward.
    Advance {
        #[serde(default)]
        periods: u64,
        #[serde(default)]
        seconds: u64,
    },
    /// Claim up to `target`, or the current period when omitted.
    Claim {
        who: String,
        #[serde(default)]
        target: Option<Period>,
        #[serde(default)]
        to_wallet: bool,
    },
    RequestWithdrawal {
        who: String,
        amount: u64,
        #[serde(default)]
        instant: bool,
        #[serde(default = "default_true")]
        claim_first: bool,
    },
    WithdrawFunds { who: String, index: usize },
    /// Self-service weight increase with a grant signed by the simulator.
    GrantWeight { who: String, weight: u64 },
    /// Owner batch weight update.
    UpdateWeights { who: Vec<String>, weights: Vec<u64> },
    /// Finalize periods up to `target`.
    HandleNewPeriod { target: Period },
    Upkeep,
    /// Read-only reward estimate, possibly past the current period.
    Forecast { who: String, target: Period },
    SetMaxPeriods { periods: u64 },
    SetMultiplier { multiplier: u64 },
    SetCooldown { cooldown: u64 },
    SetEarlyWithdrawalFee { fee: u64 },
    WithdrawRemaining { amount: u64 },
}

fn default_true() -> bool {
    true
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Funded { amount: Amount },
    Staked { who: String, amount: Amount },
    Advanced { now: u64, current_period: Period },
    Claimed { who: String, target: Period, outcome: ClaimOutcome },
    WithdrawalRequested { who: String, outcome: WithdrawalOutcome },
    FundsWithdrawn { who: String, payout: Payout },
    WeightIncreased { who: String, weight: u64 },
    WeightsUpdated { count: usize },
    PeriodsFinalized { latest: Period },
    Upkeep { performed: bool, latest: Period },
    Forecast { who: String, target: Period, calculation: RewardCalculation },
    ConfigUpdated,
    RemainingWithdrawn { amount: Amount },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub period: Period,
    #[serde(flatten)]
    pub event: Event,
}

/// One stakeholder's standing at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub address: String,
    pub wallet: Amount,
    pub new_stake: Amount,
    pub staking_balance: Amount,
    pub locked_rewards: Amount,
    pub weight: u64,
    pub last_claimed: Period,
    pub queued_withdrawals: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub current_period: Period,
    pub latest_reward_period: Period,
    pub ledger_balance: Amount,
    pub pending_withdrawals: Amount,
    pub surplus: Amount,
    pub positions: BTreeMap<String, Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub name: String,
    pub failures: usize,
    pub steps: Vec<StepReport>,
    pub summary: Summary,
}

/// A ledger wired to in-memory collaborators.
pub struct Simulation {
    token: Arc<MemoryToken>,
    clock: Arc<ManualClock>,
    signer: GrantSigner,
    owner: Address,
    ledger: StakingLedger,
    accounts: BTreeMap<String, Address>,
}

impl Simulation {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let token = Arc::new(MemoryToken::new());
        let clock = Arc::new(ManualClock::new(config.genesis));
        let signer = GrantSigner::from_secret_bytes(config.signer_secret());
        let owner = Address::from_label(&config.owner);
        let ledger = StakingLedger::new(
            config.ledger.clone(),
            owner,
            Address::from_label("tally-ledger"),
            token.clone(),
            Arc::new(signer.authorizer()),
            clock.clone(),
        )
        .context("failed to create ledger")?;

        Ok(Self {
            token,
            clock,
            signer,
            owner,
            ledger,
            accounts: BTreeMap::new(),
        })
    }

    pub fn ledger(&self) -> &StakingLedger {
        &self.ledger
    }

    fn account(&mut self, label: &str) -> Address {
        *self
            .accounts
            .entry(label.to_string())
            .or_insert_with(|| Address::from_label(label))
    }

    /// Replay every step and summarize the final state.
    pub fn run(&mut self, scenario: &Scenario) -> Result<Report> {
        info!(name = %scenario.name, steps = scenario.steps.len(), "sim: starting");
        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut failures = 0;

        for (index, step) in scenario.steps.iter().enumerate() {
            let event = match self.apply(step) {
                Ok(event) => event,
                Err(e) => {
                    warn!(step = index, error = %e, "sim: step rejected");
                    failures += 1;
                    Event::Failed {
                        error: e.to_string(),
                    }
                }
            };
            debug!(step = index, ?event, "sim: step applied");
            steps.push(StepReport {
                step: index,
                period: self.ledger.current_period(),
                event,
            });
        }

        let summary = self.summary()?;
        info!(
            failures,
            current_period = summary.current_period,
            surplus = %summary.surplus,
            "sim: finished"
        );
        Ok(Report {
            name: scenario.name.clone(),
            failures,
            steps,
            summary,
        })
    }

    fn apply(&mut self, step: &Step) -> Result<Event, LedgerError> {
        let owner = self.owner;
        let event = match step {
            Step::Fund { amount } => {
                let amount = Amount::from(*amount);
                self.token.mint(self.ledger.address(), amount);
                Event::Funded { amount }
            }
            Step::Stake { who, amount } => {
                let address = self.account(who);
                let amount = Amount::from(*amount);
                self.token.mint(&address, amount);
                self.token.approve(&address, self.ledger.address(), amount);
                self.ledger.stake(&address, amount)?;
                Event::Staked {
                    who: who.clone(),
                    amount,
                }
            }
            Step::Advance { periods, seconds } => {
                let duration = self.ledger.config().reward_period_duration;
                let delta = periods
                    .checked_mul(duration)
                    .and_then(|d| d.checked_add(*seconds))
                    .ok_or(LedgerError::ArithmeticOverflow)?;
                self.clock.advance(delta);
                Event::Advanced {
                    now: self.clock.now(),
                    current_period: self.ledger.current_period(),
                }
            }
            Step::Claim {
                who,
                target,
                to_wallet,
            } => {
                let address = self.account(who);
                let target = target.unwrap_or_else(|| self.ledger.current_period());
                let outcome = self.ledger.claim_rewards(&address, target, *to_wallet)?;
                Event::Claimed {
                    who: who.clone(),
                    target,
                    outcome,
                }
            }
            Step::RequestWithdrawal {
                who,
                amount,
                instant,
                claim_first,
            } => {
                let address = self.account(who);
                let outcome = self.ledger.request_withdrawal(
                    &address,
                    Amount::from(*amount),
                    *instant,
                    *claim_first,
                )?;
                Event::WithdrawalRequested {
                    who: who.clone(),
                    outcome,
                }
            }
            Step::WithdrawFunds { who, index } => {
                let address = self.account(who);
                let payout = self.ledger.withdraw_funds(&address, *index)?;
                Event::FundsWithdrawn {
                    who: who.clone(),
                    payout,
                }
            }
            Step::GrantWeight { who, weight } => {
                let address = self.account(who);
                let proof = self.signer.sign_grant(self.ledger.address(), &address, *weight);
                self.ledger.increase_weight(&address, *weight, &proof)?;
                Event::WeightIncreased {
                    who: who.clone(),
                    weight: *weight,
                }
            }
            Step::UpdateWeights { who, weights } => {
                let addresses: Vec<Address> = who.iter().map(|label| self.account(label)).collect();
                self.ledger.update_weight_batch(&owner, &addresses, weights)?;
                Event::WeightsUpdated {
                    count: addresses.len(),
                }
            }
            Step::HandleNewPeriod { target } => Event::PeriodsFinalized {
                latest: self.ledger.handle_new_period(*target)?,
            },
            Step::Upkeep => {
                let performed = self.ledger.perform_upkeep()?;
                Event::Upkeep {
                    performed,
                    latest: self.ledger.latest_reward_period(),
                }
            }
            Step::Forecast { who, target } => {
                let address = self.account(who);
                Event::Forecast {
                    who: who.clone(),
                    target: *target,
                    calculation: self.ledger.calculate_rewards(&address, *target)?,
                }
            }
            Step::SetMaxPeriods { periods } => {
                self.ledger.set_max_number_of_periods(&owner, *periods)?;
                Event::ConfigUpdated
            }
            Step::SetMultiplier { multiplier } => {
                self.ledger
                    .set_extra_reward_multiplier(&owner, u128::from(*multiplier))?;
                Event::ConfigUpdated
            }
            Step::SetCooldown { cooldown } => {
                self.ledger.set_cooldown(&owner, *cooldown)?;
                Event::ConfigUpdated
            }
            Step::SetEarlyWithdrawalFee { fee } => {
                self.ledger
                    .set_early_withdrawal_fee(&owner, u128::from(*fee))?;
                Event::ConfigUpdated
            }
            Step::WithdrawRemaining { amount } => Event::RemainingWithdrawn {
                amount: self
                    .ledger
                    .withdraw_remaining_funds(&owner, Amount::from(*amount))?,
            },
        };
        Ok(event)
    }

    pub fn summary(&self) -> Result<Summary> {
        let positions = self
            .accounts
            .iter()
            .map(|(label, address)| {
                let sh = self.ledger.stakeholder(address).cloned().unwrap_or_default();
                let position = Position {
                    address: address.to_string(),
                    wallet: self.token.balance_of(address),
                    new_stake: sh.new_stake,
                    staking_balance: sh.staking_balance,
                    locked_rewards: sh.locked_rewards,
                    weight: sh.weight,
                    last_claimed: sh.last_claimed,
                    queued_withdrawals: sh.withdrawals.len(),
                };
                (label.clone(), position)
            })
            .collect();

        Ok(Summary {
            current_period: self.ledger.current_period(),
            latest_reward_period: self.ledger.latest_reward_period(),
            ledger_balance: self.token.balance_of(self.ledger.address()),
            pending_withdrawals: self.ledger.pending_withdrawals(),
            surplus: self.ledger.surplus().context("failed to compute surplus")?,
            positions,
        })
    }
}
