//! # tally-core
//! Foundation types, errors, and collaborator traits for the Tally staking ledger.

pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;
