//! Withdrawal requests and their fee schedule.
//!
//! A cooldown request records the fee rate and cooldown in force when it was
//! made, so later admin changes never alter an existing request's fee.

use serde::{Deserialize, Serialize};

use tally_core::error::LedgerError;
use tally_core::types::{Amount, Timestamp};

use crate::math::decayed_fee;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub release_date: Timestamp,
    pub release_amount: Amount,
    pub fee_rate: u128,
    pub cooldown: u64,
}

impl WithdrawalRequest {
    pub fn is_mature(&self, now: Timestamp) -> bool {
        now >= self.release_date
    }

    /// Fee charged if withdrawn at `now`: linear in the time left to release.
    pub fn fee_at(&self, now: Timestamp) -> Result<Amount, LedgerError> {
        let remaining = self.release_date.saturating_sub(now);
        decayed_fee(self.release_amount, self.fee_rate, remaining, self.cooldown)
    }
}

/// Result of a withdrawal request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalOutcome {
    /// Amount removed from the stakeholder's balances after clamping.
    pub withdrawn: Amount,
    /// Transferred to the stakeholder by this call.
    pub paid: Amount,
    /// Instant-withdrawal fee retained by the ledger.
    pub fee: Amount,
    /// Queue position of the request created, if any.
    pub queued_index: Option<usize>,
}

/// Result of releasing a queued request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub amount: Amount,
    pub fee: Amount,
}
