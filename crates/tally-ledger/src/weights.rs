//! Histogram of active stakeholders by weight.
//!
//! Keeps the maximum active weight available without scanning stakeholders.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightHistogram {
    counts: BTreeMap<u64, u64>,
}

impl WeightHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one active stakeholder at `weight`.
    pub fn add(&mut self, weight: u64) {
        *self.counts.entry(weight).or_insert(0) += 1;
    }

    /// Unregister one active stakeholder at `weight`. No-op if none is held.
    pub fn remove(&mut self, weight: u64) {
        if let Some(count) = self.counts.get_mut(&weight) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&weight);
            }
        }
    }

    /// Move one stakeholder from `from` to `to`.
    pub fn shift(&mut self, from: u64, to: u64) {
        self.remove(from);
        self.add(to);
    }

    pub fn count(&self, weight: u64) -> u64 {
        self.counts.get(&weight).copied().unwrap_or(0)
    }

    /// Highest weight held by any active stakeholder, 0 if none.
    pub fn max(&self) -> u64 {
        self.counts.keys().next_back().copied().unwrap_or(0)
    }
}
