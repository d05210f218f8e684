//! Core ledger types: addresses, amounts, periods.
//!
//! All monetary values are unsigned integers in base token units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InputError;

/// Token amount in base units.
pub type Amount = u128;

/// Reward period index, counted from the ledger's start time.
pub type Period = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// A 20-byte account identifier.
///
/// Stakeholders, the owner, and the ledger's own token account are all
/// addressed this way. Displayed and parsed as `0x`-prefixed lowercase hex.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create an address from a byte array.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive an address from an arbitrary label.
    ///
    /// Takes the first 20 bytes of the BLAKE3 hash of `label`. Used by the
    /// simulator and tests to name accounts.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| InputError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| InputError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address([1u8; 20]).is_zero());
        assert_eq!(Address::default(), Address::ZERO);
    }

    #[test]
    fn display_is_prefixed_hex() {
        let addr = Address([0xab; 20]);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 42);
        assert_eq!(&s[2..6], "abab");
    }

    #[test]
    fn parse_round_trips_display() {
        let addr = Address::from_label("alice");
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn parse_accepts_unprefixed() {
        let hex = "11".repeat(20);
        let parsed: Address = hex.parse().unwrap();
        assert_eq!(parsed, Address([0x11; 20]));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not hex at all".parse::<Address>().is_err());
    }

    #[test]
    fn labels_are_deterministic_and_distinct() {
        assert_eq!(Address::from_label("bob"), Address::from_label("bob"));
        assert_ne!(Address::from_label("bob"), Address::from_label("carol"));
    }

    #[test]
    fn address_serde_json() {
        let addr = Address([7u8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
