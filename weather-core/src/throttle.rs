use chrono::{DateTime, Utc};
use std::time::Duration;

pub const DEFAULT_MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Minimum-interval gate for fetches triggered by continuous location updates.
///
/// Starts at the epoch, so the first fix is always accepted. The timestamp is
/// advanced on acceptance, not on fetch success: a failed fetch waits out the
/// full interval like a successful one.
#[derive(Debug, Clone)]
pub struct LocationThrottle {
    last_accepted_millis: i64,
    min_interval_millis: i64,
}

impl Default for LocationThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_UPDATE_INTERVAL)
    }
}

impl LocationThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_accepted_millis: 0,
            min_interval_millis: i64::try_from(min_interval.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn should_accept(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis().saturating_sub(self.last_accepted_millis) >= self.min_interval_millis
    }

    pub fn mark_accepted(&mut self, now: DateTime<Utc>) {
        self.last_accepted_millis = now.timestamp_millis();
    }

    /// `should_accept` and, if it passes, `mark_accepted`.
    pub fn try_accept(&mut self, now: DateTime<Utc>) -> bool {
        let accepted = self.should_accept(now);
        if accepted {
            self.mark_accepted(now);
        }
        accepted
    }

    pub fn last_accepted_millis(&self) -> i64 {
        self.last_accepted_millis
    }
}
