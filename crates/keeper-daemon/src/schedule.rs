//! Scheduler cadence.
//!
//! Two cadences: APR adjustment (daily) and distribution (weekly at a fixed
//! UTC weekday and hour). Nothing here is persisted. The adjustment fire
//! time is always derived from the ledger's `nextAdjustmentTime`, so a
//! restarted scheduler picks up where the ledger says it should.

use chrono::{DateTime, Utc, Weekday};
use serde::Serialize;

use keeper_types::{SECS_PER_DAY, SECS_PER_WEEK};

const SECS_PER_HOUR: u64 = 60 * 60;

/// Work the scheduler can fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    /// Run the APR Controller.
    Adjustment,
    /// Run the Distribution Engine.
    Distribution,
}

/// Next fire time of the weekly distribution strictly after `now`.
pub fn next_distribution_time(now: u64, weekday: Weekday, hour_utc: u32) -> u64 {
    let day = now / SECS_PER_DAY;
    // 1970-01-01 was a Thursday.
    let today = (day + 3) % 7;
    let target = u64::from(weekday.num_days_from_monday());
    let candidate_day = day + (target + 7 - today) % 7;
    let candidate = candidate_day * SECS_PER_DAY + u64::from(hour_utc) * SECS_PER_HOUR;
    if candidate > now {
        candidate
    } else {
        candidate + SECS_PER_WEEK
    }
}

/// Seconds to wait from `now` until `at` (zero if already due).
pub fn seconds_until(now: u64, at: u64) -> u64 {
    at.saturating_sub(now)
}

/// Render a Unix timestamp as RFC 3339 for logs and reports.
pub fn rfc3339(at: u64) -> String {
    i64::try_from(at)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(|| at.to_string(), |dt| dt.to_rfc3339())
}

/// Upcoming fire times of both cadences.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Cadence {
    /// Next APR adjustment attempt.
    pub next_adjustment: u64,
    /// Next distribution.
    pub next_distribution: u64,
}

impl Cadence {
    /// The job due first. Adjustment wins a tie.
    pub fn next(&self) -> (Job, u64) {
        if self.next_adjustment <= self.next_distribution {
            (Job::Adjustment, self.next_adjustment)
        } else {
            (Job::Distribution, self.next_distribution)
        }
    }
}
