//! # tally-ledger: Period-based staking ledger.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! The ledger custodies a single token and distributes its undistributed
//! holdings to stakers, one reward period at a time:
//! - **Lazy finalization**: every mutating call first finalizes the periods
//!   that elapsed since the last call. No background scheduler is needed.
//! - **Compounding walk**: rewards are computed period by period against a
//!   running balance, so truncation matches the iterative definition exactly.
//! - **Weighted shares**: a stakeholder's weight scales its share of each
//!   period's reward by `1 + weight · multiplier`.
//! - **Lock window**: rewards credited in the current window of
//!   `periods_for_extra_reward` periods stay locked until the window passes.
//! - **Withdrawal queue**: cooldown requests pay a fee that decays linearly to
//!   zero at the release date.

pub mod clock;
pub mod ledger;
pub mod math;
pub mod memory;
pub mod periods;
pub mod rewards;
pub mod stakeholder;
pub mod weights;
pub mod withdrawal;

pub use clock::PeriodClock;
pub use ledger::StakingLedger;
pub use periods::{PeriodLedger, RewardPeriod, Series, StakeTotals};
pub use rewards::{ClaimOutcome, RewardCalculation, RewardEngine};
pub use stakeholder::Stakeholder;
pub use withdrawal::{Payout, WithdrawalOutcome, WithdrawalRequest};
