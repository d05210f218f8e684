//! Ledger constants. All monetary values are in base token units.

/// Denominator for the early-withdrawal fee rate (parts per hundred million).
///
/// A fee rate of `10_000_000` is 10%.
pub const FEE_PRECISION: u128 = 100_000_000;

/// Fixed-point base of the extra-reward multiplier.
///
/// A multiplier of `MULTIPLIER_PRECISION` adds one full stake-equivalent per
/// unit of weight: weight 1 doubles the weighted stake, weight 2 triples it.
pub const MULTIPLIER_PRECISION: u128 = 1_000_000;

/// Default reward horizon, in periods (three years of daily periods).
pub const DEFAULT_MAX_NUMBER_OF_PERIODS: u64 = 1095;

/// Default reward period length in seconds (one day).
pub const DEFAULT_REWARD_PERIOD_DURATION: u64 = 86_400;

/// Default lock window in periods (roughly six months of daily periods).
pub const DEFAULT_PERIODS_FOR_EXTRA_REWARD: u64 = 182;

/// Default extra-reward multiplier (1.0 in fixed point).
pub const DEFAULT_EXTRA_REWARD_MULTIPLIER: u128 = MULTIPLIER_PRECISION;

/// Default withdrawal cooldown in seconds (seven days).
pub const DEFAULT_COOLDOWN: u64 = 7 * 86_400;

/// Default early-withdrawal fee rate (10%).
pub const DEFAULT_EARLY_WITHDRAWAL_FEE: u128 = 10_000_000;

/// Domain separator for weight-grant signatures.
pub const WEIGHT_GRANT_DOMAIN: &[u8] = b"tally/weight-grant/v1";
