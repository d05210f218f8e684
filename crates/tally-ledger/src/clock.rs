//! Wall-clock to period index conversion.

use tally_core::types::{Period, Timestamp};

/// Maps timestamps onto reward periods counted from `start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodClock {
    start_time: Timestamp,
    period_duration: u64,
}

impl PeriodClock {
    /// `period_duration` must be positive; [`LedgerConfig::validate`] ensures it.
    ///
    /// [`LedgerConfig::validate`]: tally_core::config::LedgerConfig::validate
    pub fn new(start_time: Timestamp, period_duration: u64) -> Self {
        Self {
            start_time,
            period_duration: period_duration.max(1),
        }
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn period_duration(&self) -> u64 {
        self.period_duration
    }

    /// Period containing `now`. Times before the start map to period 0.
    pub fn period_at(&self, now: Timestamp) -> Period {
        now.saturating_sub(self.start_time) / self.period_duration
    }

    /// First second of `period`.
    pub fn period_start(&self, period: Period) -> Timestamp {
        self.start_time
            .saturating_add(period.saturating_mul(self.period_duration))
    }
}
