//! Fixed-point helpers.
//!
//! Products are taken in `u128` when they fit and in [`BigUint`] otherwise;
//! the quotient must fit back into `u128`. Every division truncates.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use tally_core::constants::{FEE_PRECISION, MULTIPLIER_PRECISION};
use tally_core::error::LedgerError;
use tally_core::types::Amount;

/// `floor(a · b / d)`. `None` if `d` is zero or the quotient overflows.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / d);
    }
    (BigUint::from(a) * BigUint::from(b) / BigUint::from(d)).to_u128()
}

/// Weighted stake: `balance + floor(balance · weight · multiplier / 1e6)`.
pub fn weighted_stake(balance: Amount, weight: u64, multiplier: u128) -> Result<Amount, LedgerError> {
    let units = balance
        .checked_mul(weight as u128)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let extra = mul_div(units, multiplier, MULTIPLIER_PRECISION).ok_or(LedgerError::ArithmeticOverflow)?;
    balance.checked_add(extra).ok_or(LedgerError::ArithmeticOverflow)
}

/// Fee for an instant withdrawal: `floor(amount · rate / 1e8)`.
pub fn instant_fee(amount: Amount, rate: u128) -> Result<Amount, LedgerError> {
    mul_div(amount, rate, FEE_PRECISION).ok_or(LedgerError::ArithmeticOverflow)
}

/// Fee for withdrawing a queued request `remaining` seconds before release.
///
/// `floor(amount · rate · remaining / (cooldown · 1e8))`, linear in
/// `remaining`: the instant fee at `remaining == cooldown`, zero at release.
pub fn decayed_fee(amount: Amount, rate: u128, remaining: u64, cooldown: u64) -> Result<Amount, LedgerError> {
    if remaining == 0 || cooldown == 0 {
        return Ok(0);
    }
    let remaining = remaining.min(cooldown);
    let numerator = BigUint::from(amount) * BigUint::from(rate) * BigUint::from(remaining);
    let denominator = BigUint::from(cooldown) * BigUint::from(FEE_PRECISION);
    (numerator / denominator)
        .to_u128()
        .ok_or(LedgerError::ArithmeticOverflow)
}
