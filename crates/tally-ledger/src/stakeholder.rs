//! Per-address staking records.

use serde::{Deserialize, Serialize};

use tally_core::types::{Amount, Period, Timestamp};

use crate::withdrawal::WithdrawalRequest;

/// A stakeholder's position.
///
/// `staking_balance` includes every reward settled up to `last_claimed`.
/// `new_stake` was deposited in period `last_claimed` and earns from the next
/// period on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub new_stake: Amount,
    pub staking_balance: Amount,
    pub weight: u64,
    pub last_claimed: Period,
    /// Activation time; zero while inactive.
    pub start_date: Timestamp,
    /// Part of `staking_balance` still inside the lock window.
    pub locked_rewards: Amount,
    /// Queued cooldown withdrawals, in request order.
    pub withdrawals: Vec<WithdrawalRequest>,
}

impl Stakeholder {
    /// Active while any balance is held.
    pub fn is_active(&self) -> bool {
        self.new_stake > 0 || self.staking_balance > 0 || self.locked_rewards > 0
    }

    /// Most that can be withdrawn right now.
    pub fn withdrawable(&self) -> Amount {
        self.new_stake
            .saturating_add(self.staking_balance)
            .saturating_sub(self.locked_rewards)
    }
}
