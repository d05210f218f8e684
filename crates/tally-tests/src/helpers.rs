//! Shared harness for scenario and property tests.

use std::sync::Arc;

use tally_core::config::LedgerConfig;
use tally_core::crypto::GrantSigner;
use tally_core::error::LedgerError;
use tally_core::traits::TokenLedger as _;
use tally_core::types::{Address, Amount, Period};
use tally_ledger::memory::{ManualClock, MemoryToken};
use tally_ledger::StakingLedger;

/// Clock reading at ledger creation.
pub const GENESIS: u64 = 1_700_000_000;

/// Period length used by [`Harness::small`].
pub const DAY: u64 = 86_400;

/// A ledger wired to an in-memory token, a manual clock, and a grant signer.
pub struct Harness {
    pub token: Arc<MemoryToken>,
    pub clock: Arc<ManualClock>,
    pub signer: GrantSigner,
    pub ledger: StakingLedger,
}

impl Harness {
    pub fn new(config: LedgerConfig) -> Self {
        let token = Arc::new(MemoryToken::new());
        let clock = Arc::new(ManualClock::new(GENESIS));
        let signer = GrantSigner::from_secret_bytes([42u8; 32]);
        let ledger = StakingLedger::new(
            config,
            owner(),
            Address::from_label("tally-ledger"),
            token.clone(),
            Arc::new(signer.authorizer()),
            clock.clone(),
        )
        .expect("valid config");
        Self {
            token,
            clock,
            signer,
            ledger,
        }
    }

    /// Daily periods, a ten-period horizon, and no lock-window crossing.
    pub fn small() -> Self {
        Self::new(LedgerConfig {
            max_number_of_periods: 10,
            reward_period_duration: DAY,
            periods_for_extra_reward: 100,
            cooldown: 10 * DAY,
            ..LedgerConfig::default()
        })
    }

    pub fn ledger_address(&self) -> Address {
        *self.ledger.address()
    }

    /// Add `amount` to the reward pool.
    pub fn fund(&self, amount: Amount) {
        self.token.mint(&self.ledger_address(), amount);
    }

    /// Mint `amount` to `who`, approve it, and stake it.
    pub fn stake(&mut self, who: &Address, amount: Amount) -> Result<(), LedgerError> {
        self.token.mint(who, amount);
        let ledger = self.ledger_address();
        self.token.approve(who, &ledger, amount);
        self.ledger.stake(who, amount)
    }

    /// Move the clock forward by whole periods.
    pub fn advance_periods(&self, periods: u64) {
        self.clock
            .advance(periods * self.ledger.config().reward_period_duration);
    }

    pub fn advance_seconds(&self, seconds: u64) {
        self.clock.advance(seconds);
    }

    pub fn balance(&self, who: &Address) -> Amount {
        self.token.balance_of(who)
    }

    pub fn ledger_balance(&self) -> Amount {
        self.balance(&self.ledger_address())
    }

    /// Settle `who` up to the current period without paying out.
    pub fn claim_now(&mut self, who: &Address) -> Result<Amount, LedgerError> {
        let current = self.ledger.current_period();
        Ok(self.ledger.claim_rewards(who, current, false)?.reward)
    }

    /// Staking balance plus pending new stake.
    pub fn position(&self, who: &Address) -> Amount {
        self.ledger
            .stakeholder(who)
            .map_or(0, |sh| sh.staking_balance + sh.new_stake)
    }

    pub fn reward_per_period(&self, period: Period) -> Amount {
        self.ledger
            .reward_period(period)
            .map_or(0, |record| record.reward_per_period)
    }

    /// Grant `weight` to `who` through the self-service path.
    pub fn grant_weight(&mut self, who: &Address, weight: u64) -> Result<(), LedgerError> {
        let proof = self.signer.sign_grant(&self.ledger_address(), who, weight);
        self.ledger.increase_weight(who, weight, &proof)
    }
}

/// The ledger owner used by every harness.
pub fn owner() -> Address {
    Address::from_label("owner")
}

/// Address of the `i`-th test stakeholder.
pub fn staker(i: usize) -> Address {
    Address::from_label(&format!("staker-{i}"))
}
