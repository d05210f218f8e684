//! Integration test suite for the Tally staking ledger.
//!
//! Scenario tests replay multi-stakeholder histories end to end against the
//! in-memory token and a manual clock. Property tests check the ledger's
//! invariants under randomized stakes, pools, and timings.

pub mod helpers;
