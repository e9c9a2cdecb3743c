use std::{
    ops::ControlFlow,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::{
    clock::{Clock, duration_until, seconds_until},
    scheduling::{EndCallback, ProgressCallback, RepeatingNotifier, TimerHandle},
};

/// Fires one callback a whole number of minutes after [`start`](Self::start),
/// optionally with minute/second progress from a [`RepeatingNotifier`].
///
/// Firing consumes the accumulated minutes, so the next start counts from zero.
pub struct MinuteTimer {
    clock: Arc<dyn Clock>,
    callback: EndCallback,
    delay_minutes: Arc<AtomicU64>,
    drop_seconds: bool,
    started_at: Option<DateTime<Utc>>,
    timer: TimerHandle,
    repeater: Option<RepeatingNotifier>,
}

impl MinuteTimer {
    pub fn new(clock: Arc<dyn Clock>, callback: EndCallback) -> Self {
        Self {
            clock,
            callback,
            delay_minutes: Arc::default(),
            drop_seconds: false,
            started_at: None,
            timer: TimerHandle::new(),
            repeater: None,
        }
    }

    pub fn add_minutes(&mut self, minutes: u64) {
        // The closure always returns Some, so this never fails.
        let _ = self
            .delay_minutes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |delay| {
                Some(delay.saturating_add(minutes))
            });
    }

    pub fn delay_minutes(&self) -> u64 {
        self.delay_minutes.load(Ordering::SeqCst)
    }

    pub fn set_drop_seconds(&mut self, drop_seconds: bool) {
        self.drop_seconds = drop_seconds;
    }

    pub fn set_repeater(
        &mut self,
        minutes_callback: ProgressCallback,
        seconds_callback: ProgressCallback,
        end_callback: EndCallback,
    ) {
        if let Some(repeater) = self.repeater.as_mut() {
            repeater.reset();
        }
        self.repeater = Some(RepeatingNotifier::new(
            minutes_callback,
            seconds_callback,
            end_callback,
        ));
    }

    /// When the timer fires, if it has been started.
    pub fn end_instant(&self) -> Option<DateTime<Utc>> {
        let started_at = self.started_at?;
        let minutes = i64::try_from(self.delay_minutes()).ok()?;
        let end_instant = started_at.checked_add_signed(TimeDelta::try_minutes(minutes)?)?;

        if self.drop_seconds {
            end_instant.duration_trunc(TimeDelta::minutes(1)).ok()
        } else {
            Some(end_instant)
        }
    }

    pub fn left_seconds(&self) -> u64 {
        self.end_instant()
            .map(|end_instant| seconds_until(self.clock.now(), end_instant))
            .unwrap_or(0)
    }

    pub fn start(&mut self) {
        self.clear();
        self.started_at = Some(self.clock.now());

        let Some(end_instant) = self.end_instant() else {
            log::warn!("[TIMER] Delay out of range. [delay_minutes = {}]", self.delay_minutes());
            return;
        };
        let delay = duration_until(self.clock.now(), end_instant);
        log::info!(
            "[TIMER] Firing in {:?}. [delay_minutes = {}, drop_seconds = {}]",
            delay,
            self.delay_minutes(),
            self.drop_seconds
        );

        let callback = self.callback.clone();
        let delay_minutes = Arc::clone(&self.delay_minutes);
        self.timer.start(delay, move || {
            delay_minutes.store(0, Ordering::SeqCst);
            callback();
            ControlFlow::Break(())
        });

        if let Some(repeater) = self.repeater.as_mut() {
            repeater.tick_toward(delay);
        }
    }

    pub fn reset(&mut self) {
        self.clear();
        self.delay_minutes.store(0, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.timer.is_running()
    }

    fn clear(&mut self) {
        self.timer.reset();
        if let Some(repeater) = self.repeater.as_mut() {
            repeater.reset();
        }
    }
}
