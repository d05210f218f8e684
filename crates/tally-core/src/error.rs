//! Error types for the Tally staking ledger.
//!
//! Every failure rejects the whole call. Withdrawal amounts that exceed what a
//! stakeholder may withdraw are clamped, never reported as errors.
use thiserror::Error;

use crate::types::{Address, Amount, Period};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid weight proof for {subject} at weight {weight}")] InvalidProof { subject: Address, weight: u64 },
    #[error("weight proof already used")] ProofReused,
    #[error("no weight increase: current {current}, requested {requested}")] WeightNotIncreased { current: u64, requested: u64 },
    #[error("caller {0} is not the owner")] NotOwner(Address),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("amount not positive")] ZeroAmount,
    #[error("length mismatch: {addresses} addresses, {weights} weights")] LengthMismatch { addresses: usize, weights: usize },
    #[error("withdrawal request index out of bounds: {index} >= {len}")] InvalidRequestIndex { index: usize, len: usize },
    #[error("target period {target} is ahead of current period {current}")] FuturePeriod { target: Period, current: Period },
    #[error("invalid configuration: {0}")] InvalidConfig(String),
    #[error("invalid address: {0}")] InvalidAddress(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token transfer of {amount} to {to} failed")] TransferFailed { to: Address, amount: Amount },
    #[error("token transfer of {amount} from {from} not approved")] TransferFromFailed { from: Address, amount: Amount },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)] Auth(#[from] AuthError),
    #[error(transparent)] Input(#[from] InputError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}
