use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of wall-clock time for everything that schedules against an end instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the operating system wall clock.
///
/// After a host suspend the wall clock has moved on while monotonic timers have not,
/// which is why remaining time is always recomputed from this clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from the Tokio clock.
///
/// With a paused runtime this advances in lockstep with `tokio::time`, so timer
/// deadlines and "now" never disagree.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(Instant::now() - self.origin).unwrap_or(TimeDelta::MAX);
        self.wall_origin
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Whole seconds from `from` to `to`, rounded to the nearest second.
///
/// Timer wakeups land a few milliseconds late; rounding keeps a tick that is due
/// at "60 seconds left" from reading as 59.
pub fn whole_seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let millis = (to - from).num_milliseconds();
    (millis + 500).div_euclid(1000)
}

/// Like [`whole_seconds_between`] but never negative.
pub fn seconds_until(now: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    whole_seconds_between(now, end).max(0) as u64
}

/// Exact time left until `end`, zero once it has passed. Timer deadlines use this,
/// never the rounded counts.
pub fn duration_until(now: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    (end - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    fn base() -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 5, 31)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn late_wakeups_round_to_the_expected_second() {
        let now = base();
        let end = now + TimeDelta::seconds(60);

        assert_eq!(whole_seconds_between(now + TimeDelta::milliseconds(4), end), 60);
        assert_eq!(whole_seconds_between(now - TimeDelta::milliseconds(4), end), 60);
        assert_eq!(whole_seconds_between(now + TimeDelta::milliseconds(700), end), 59);
    }

    #[test]
    fn past_end_is_negative_but_seconds_until_clamps() {
        let now = base();
        let end = now - TimeDelta::seconds(5);

        assert_eq!(whole_seconds_between(now, end), -5);
        assert_eq!(seconds_until(now, end), 0);
    }

    #[test]
    fn duration_until_keeps_sub_second_precision() {
        let now = base() + TimeDelta::milliseconds(42_600);
        let end = base() + TimeDelta::minutes(2);

        assert_eq!(duration_until(now, end), Duration::from_millis(77_400));
        assert_eq!(seconds_until(now, end), 77);
        assert_eq!(duration_until(end, now), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::starting_at(base());

        tokio::time::sleep(Duration::from_secs(90)).await;

        assert_eq!(clock.now(), base() + TimeDelta::seconds(90));
    }
}
