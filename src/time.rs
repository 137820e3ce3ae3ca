use std::time::Duration;

use chrono::Utc;
use tracing::instrument;

pub type Timestamp = chrono::DateTime<Utc>;

/// A timer that ticks every `period`, on wall-clock multiples of `period`.
///
/// A one-minute period ticks at the top of every minute, so every process running the sweeper
/// shares the same schedule.
#[instrument]
pub fn aligned_timer(period: Duration) -> tokio::time::Interval {
    let period = period.max(Duration::from_millis(1));
    let start = tokio::time::Instant::now() + duration_to_next_instant(period, Utc::now());

    let mut timer = tokio::time::interval_at(start, period);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    timer
}

/// compute the time until the next multiple of `period` since the Unix epoch.
fn duration_to_next_instant(period: Duration, now: Timestamp) -> Duration {
    let period = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
    let elapsed = now.timestamp_millis().rem_euclid(period);

    if elapsed == 0 {
        return Duration::ZERO;
    }

    Duration::from_millis((period - elapsed) as u64)
}
