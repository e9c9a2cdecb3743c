use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::clock::{Clock, seconds_until};

use super::{
    common::{Epoch, ProgressCallback, defer},
    timer_handle::TimerHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    HalfMinutes,
    Seconds,
    Expiry,
}

/// A callback bound to a period and an initial delay.
///
/// A zero period makes the notification one-shot: it fires once the delay is over
/// and that firing ends the countdown.
#[derive(Clone)]
pub struct Notification {
    pub role: Role,
    pub period: Duration,
    pub first_run_delay: Duration,
    pub callback: ProgressCallback,
}

impl Notification {
    pub fn new(role: Role, period: Duration, callback: ProgressCallback) -> Self {
        Self {
            role,
            period,
            first_run_delay: Duration::ZERO,
            callback,
        }
    }

    fn is_one_shot(&self) -> bool {
        self.period.is_zero()
    }
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notification")
            .field("role", &self.role)
            .field("period", &self.period)
            .field("first_run_delay", &self.first_run_delay)
            .finish_non_exhaustive()
    }
}

struct EngineState {
    end_instant: DateTime<Utc>,
    running: bool,
    /// Notifications of the current run that have not completed yet.
    pending: usize,
    timers: Vec<TimerHandle>,
}

struct Shared {
    clock: Arc<dyn Clock>,
    epoch: Epoch,
    state: Mutex<EngineState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remaining_periods(&self, period: Duration) -> u64 {
        let period = period.as_secs();
        if period == 0 {
            return 0;
        }
        let end_instant = self.state().end_instant;
        seconds_until(self.clock.now(), end_instant) / period
    }

    /// Arms `timer` and takes ownership of it, unless the run it belongs to was
    /// reset in the meantime.
    fn register<F>(&self, epoch: u64, delay: Duration, callback: F) -> bool
    where
        F: FnMut() -> ControlFlow<(), Duration> + Send + 'static,
    {
        let mut state = self.state();
        if !self.epoch.is_current(epoch) {
            return false;
        }

        state.timers.retain(TimerHandle::is_running);

        let mut timer = TimerHandle::new();
        let started = timer.start(delay, callback);
        state.timers.push(timer);
        started
    }

    fn complete(&self, epoch: u64, role: Role) {
        let mut state = self.state();
        if !self.epoch.is_current(epoch) {
            return;
        }

        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            log::debug!("[COUNTDOWN] All notifications completed. [last = {:?}]", role);
            state.running = false;
        }
    }

    /// Claims the expiry of run `epoch`: nothing else of that run may fire after it.
    ///
    /// Returns `false` if the run was reset or already expired, in which case the
    /// expiry callback must not run.
    fn expire(&self, epoch: u64) -> bool {
        let mut state = self.state();
        if !self.epoch.is_current(epoch) {
            return false;
        }

        log::info!("[COUNTDOWN] Expired at {}", state.end_instant);
        self.epoch.advance();
        state.running = false;
        state.pending = 0;
        for mut timer in state.timers.drain(..) {
            timer.reset();
        }
        true
    }

    fn cancel(&self) {
        let mut state = self.state();
        self.epoch.advance();
        state.running = false;
        state.pending = 0;
        state.end_instant = self.clock.now();
        for mut timer in state.timers.drain(..) {
            timer.reset();
        }
    }
}

/// Runs a set of notifications against one shared end instant.
pub struct CountdownEngine {
    shared: Arc<Shared>,
    notifications: Vec<Notification>,
}

impl CountdownEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let end_instant = clock.now();
        Self {
            shared: Arc::new(Shared {
                clock,
                epoch: Epoch::new(),
                state: Mutex::new(EngineState {
                    end_instant,
                    running: false,
                    pending: 0,
                    timers: vec![],
                }),
            }),
            notifications: vec![],
        }
    }

    pub fn set_notifications(&mut self, notifications: Vec<Notification>) {
        self.notifications = notifications;
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Starts every notification against `end_instant`, discarding the timers of
    /// any previous run first.
    ///
    /// Returns `true` if at least one notification armed a timer.
    pub fn start(&mut self, end_instant: DateTime<Utc>) -> bool {
        self.shared.cancel();

        let epoch = self.shared.epoch.current();
        {
            let mut state = self.shared.state();
            state.end_instant = end_instant;
            state.running = !self.notifications.is_empty();
            state.pending = self.notifications.len();
        }

        log::info!(
            "[COUNTDOWN] Starting {} notifications, ends at {}",
            self.notifications.len(),
            end_instant
        );

        let mut started = false;
        for notification in &self.notifications {
            let first_run_delay = notification.first_run_delay;
            started |= start_one(&self.shared, notification.clone(), first_run_delay, epoch);
        }
        started
    }

    pub fn reset(&mut self) {
        log::debug!("[COUNTDOWN] Reset");
        self.shared.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        self.shared.state().end_instant
    }

    /// Timers of the current run that are still pending.
    pub fn active_timers(&self) -> usize {
        self.shared
            .state()
            .timers
            .iter()
            .filter(|timer| timer.is_running())
            .count()
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        // Timer tasks hold the shared state, so it would otherwise outlive the engine.
        self.shared.cancel();
    }
}

fn start_one(
    shared: &Arc<Shared>,
    notification: Notification,
    delay: Duration,
    epoch: u64,
) -> bool {
    if !shared.epoch.is_current(epoch) {
        return false;
    }

    if !delay.is_zero() {
        log::debug!("[COUNTDOWN] Delaying {:?} by {:?}", notification.role, delay);
        let task_shared = Arc::clone(shared);
        return shared.register(epoch, delay, move || {
            start_one(&task_shared, notification.clone(), Duration::ZERO, epoch);
            ControlFlow::Break(())
        });
    }

    if notification.is_one_shot() {
        // Claim the run under the lock before calling out.
        if shared.expire(epoch) {
            (notification.callback)(0);
        }
        return false;
    }

    (notification.callback)(shared.remaining_periods(notification.period));

    if shared.remaining_periods(notification.period) <= 1 {
        shared.complete(epoch, notification.role);
        return false;
    }

    let period = notification.period;
    let task_shared = Arc::clone(shared);
    shared.register(epoch, period, move || {
        let left = task_shared.remaining_periods(period);
        if left > 0 {
            let callback = notification.callback.clone();
            defer(&task_shared.epoch, epoch, move || callback(left));
            ControlFlow::Continue(period)
        } else {
            task_shared.complete(epoch, notification.role);
            ControlFlow::Break(())
        }
    })
}
