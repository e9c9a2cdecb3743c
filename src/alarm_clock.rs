use std::{sync::Arc, time::Duration};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::{
    appsettings::AlarmSettings,
    clock::{Clock, SystemClock, duration_until, seconds_until},
    scheduling::{CountdownEngine, EndCallback, Notification, ProgressCallback, Role},
};

const HALF_MINUTE: Duration = Duration::from_secs(30);
const SECOND: Duration = Duration::from_secs(1);
const LAST_MINUTE: Duration = Duration::from_secs(60);

/// Countdown with three fixed notifications: half-minute progress, per-second
/// progress over the last minute, and expiry.
///
/// Extend the deadline with [`add`](Self::add), then [`start`](Self::start). Adding
/// while a countdown is pending accumulates; adding after it has run out starts a
/// fresh one from now.
pub struct AlarmClock {
    clock: Arc<dyn Clock>,
    half_minutes: Notification,
    seconds: Notification,
    expiry: Notification,
    end_instant: DateTime<Utc>,
    engine: CountdownEngine,
    /// Round every new end instant down to the minute.
    pub drop_seconds: bool,
    /// Only fire the expiry notification, no progress updates.
    pub only_alarm: bool,
}

impl AlarmClock {
    pub fn new(
        half_minutes_callback: ProgressCallback,
        seconds_callback: ProgressCallback,
        end_callback: EndCallback,
    ) -> Self {
        Self::with_clock(
            Arc::new(SystemClock),
            half_minutes_callback,
            seconds_callback,
            end_callback,
        )
    }

    pub fn with_clock(
        clock: Arc<dyn Clock>,
        half_minutes_callback: ProgressCallback,
        seconds_callback: ProgressCallback,
        end_callback: EndCallback,
    ) -> Self {
        let expiry_callback: ProgressCallback = Arc::new(move |_| end_callback());

        Self {
            half_minutes: Notification::new(Role::HalfMinutes, HALF_MINUTE, half_minutes_callback),
            seconds: Notification::new(Role::Seconds, SECOND, seconds_callback),
            expiry: Notification::new(Role::Expiry, Duration::ZERO, expiry_callback),
            end_instant: clock.now(),
            engine: CountdownEngine::new(Arc::clone(&clock)),
            clock,
            drop_seconds: false,
            only_alarm: true,
        }
    }

    pub fn apply_settings(&mut self, settings: &AlarmSettings) {
        self.drop_seconds = settings.drop_seconds;
        self.only_alarm = settings.only_alarm;
    }

    /// Pushes the end instant `minutes` further out. Negative values count as zero.
    pub fn add(&mut self, minutes: i64) {
        if minutes < 0 {
            log::warn!("Ignoring negative minutes for alarm. [minutes = {}]", minutes);
        }
        match TimeDelta::try_minutes(minutes.max(0)) {
            Some(by) => self.extend(by),
            None => log::warn!("Alarm minutes out of range. [minutes = {}]", minutes),
        }
    }

    /// Same as [`add`](Self::add) with arbitrary precision.
    pub fn extend(&mut self, by: TimeDelta) {
        let by = by.max(TimeDelta::zero());
        let now = self.clock.now();
        let base = if self.end_instant > now {
            self.end_instant
        } else {
            now
        };

        let Some(end_instant) = base.checked_add_signed(by) else {
            log::warn!("Alarm end instant out of range, keeping {}", self.end_instant);
            return;
        };

        self.end_instant = if self.drop_seconds {
            truncate_to_minute(end_instant)
        } else {
            end_instant
        };
        log::debug!("Alarm end instant is now {}", self.end_instant);
    }

    /// Restores an end instant saved before the previous instance was torn down.
    ///
    /// An instant already in the past is clamped to now. Call [`start`](Self::start)
    /// afterwards to resume.
    pub fn set_end_date(&mut self, end_instant: DateTime<Utc>) {
        self.end_instant = end_instant.max(self.clock.now());
    }

    /// (Re)starts the countdown toward the current end instant.
    ///
    /// Returns `true` if any notification armed a timer.
    pub fn start(&mut self) -> bool {
        self.engine.reset();

        let until_end = duration_until(self.clock.now(), self.end_instant);
        self.expiry.first_run_delay = until_end;
        let mut notifications = vec![self.expiry.clone()];

        if !self.only_alarm {
            self.seconds.first_run_delay = until_end.saturating_sub(LAST_MINUTE);
            notifications.push(self.half_minutes.clone());
            notifications.push(self.seconds.clone());
        }

        log::info!(
            "Starting alarm. [until_end = {:?}, only_alarm = {}]",
            until_end,
            self.only_alarm
        );

        self.engine.set_notifications(notifications);
        self.engine.start(self.end_instant)
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.end_instant = self.clock.now();
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// The end instant while running, otherwise now.
    pub fn end_date(&self) -> DateTime<Utc> {
        if self.is_running() {
            self.end_instant
        } else {
            self.clock.now()
        }
    }

    pub fn left_seconds(&self) -> u64 {
        seconds_until(self.clock.now(), self.end_instant)
    }

    pub fn active_timers(&self) -> usize {
        self.engine.active_timers()
    }
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(instant)
}
