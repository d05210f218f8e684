//! Trait interfaces for the ledger's external collaborators.
//!
//! - [`TokenLedger`]: the fungible token the ledger custodies
//! - [`WeightAuthorizer`]: verifies self-service weight grants
//! - [`Clock`]: wall-clock source for period computation

use crate::types::{Address, Amount, Timestamp};

/// A fungible-token ledger in the shape of ERC-20.
///
/// The staking ledger owns a token account (`holder`) and moves funds in with
/// [`transfer_from`](Self::transfer_from) against a prior allowance, and out
/// with [`transfer`](Self::transfer). Both return `false` on failure, leaving
/// balances untouched.
pub trait TokenLedger: Send + Sync {
    /// Move `amount` from the `holder` account to `to`.
    fn transfer(&self, holder: &Address, to: &Address, amount: Amount) -> bool;

    /// Move `amount` from `from` to `to`, spending the allowance `from`
    /// granted to `to`.
    fn transfer_from(&self, from: &Address, to: &Address, amount: Amount) -> bool;

    /// Current balance of `account`.
    fn balance_of(&self, account: &Address) -> Amount;
}

/// Verifies proofs authorizing a subject to raise its weight.
///
/// A proof binds `(ledger, subject, weight)`: a proof issued for one weight or
/// one ledger must not verify for another.
pub trait WeightAuthorizer: Send + Sync {
    /// Whether `proof` authorizes `subject` to hold `weight` on `ledger`.
    fn verify(&self, ledger: &Address, subject: &Address, weight: u64, proof: &[u8]) -> bool;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> Timestamp;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}
