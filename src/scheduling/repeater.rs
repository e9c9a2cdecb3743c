//! Minute-then-second progress ticks toward the end of a countdown.
//!
//! A countdown of `seconds` is split into a minutes phase, one tick per whole
//! minute starting right away, and a seconds phase covering the final minute (or
//! all of it when under a minute remains). After the last second tick the end
//! callback fires exactly once.
//!
//! ```text
//!  start      +60      ...   seconds-60   +1  ...   seconds
//!  Minute(m)  Minute(m-1)    Second(60)   Second(59) End
//! ```

use std::{ops::ControlFlow, time::Duration};

use super::{
    common::{Epoch, EndCallback, ProgressCallback, defer},
    timer_handle::{TimerControl, TimerHandle},
};

const MINUTE: u64 = 60;

/// How a span of seconds is split between the two phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatPlan {
    pub minutes: u64,
    pub left_seconds: u64,
    /// Offset from the start at which the seconds phase begins.
    pub first_phase_delay: u64,
}

impl RepeatPlan {
    pub fn for_seconds(seconds: u64) -> Self {
        let minutes = seconds / MINUTE;
        if seconds < MINUTE {
            Self {
                minutes,
                left_seconds: seconds,
                first_phase_delay: 0,
            }
        } else {
            Self {
                minutes,
                left_seconds: MINUTE,
                first_phase_delay: seconds - MINUTE,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Minutes,
    Seconds,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Minute(u64),
    Second(u64),
    End,
}

/// The repeater's state machine. Each [`step`](Sequence::step) yields the tick to
/// deliver now and when the next step is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    plan: RepeatPlan,
    phase: Phase,
    remaining: u64,
}

impl Sequence {
    /// Returns the sequence together with the delay before its first step.
    pub fn new(plan: RepeatPlan) -> (Self, Duration) {
        if plan.minutes > 0 {
            let sequence = Self {
                plan,
                phase: Phase::Minutes,
                remaining: plan.minutes,
            };
            (sequence, Duration::ZERO)
        } else {
            let sequence = Self {
                plan,
                phase: Phase::Seconds,
                remaining: plan.left_seconds,
            };
            (sequence, Duration::from_secs(plan.first_phase_delay))
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step(&mut self) -> (Option<Tick>, TimerControl) {
        match self.phase {
            Phase::Minutes => {
                let tick = Tick::Minute(self.remaining);
                self.remaining -= 1;
                if self.remaining > 0 {
                    return (Some(tick), ControlFlow::Continue(Duration::from_secs(MINUTE)));
                }

                // Last minute tick happened at (minutes - 1) * 60.
                let last_minute_at = (self.plan.minutes - 1) * MINUTE;
                let seconds_phase_in = self.plan.first_phase_delay.saturating_sub(last_minute_at);
                self.phase = Phase::Seconds;
                self.remaining = self.plan.left_seconds;

                (
                    Some(tick),
                    ControlFlow::Continue(Duration::from_secs(seconds_phase_in)),
                )
            }
            Phase::Seconds if self.remaining > 0 => {
                let tick = Tick::Second(self.remaining);
                self.remaining -= 1;
                (Some(tick), ControlFlow::Continue(Duration::from_secs(1)))
            }
            Phase::Seconds => {
                self.phase = Phase::Done;
                (Some(Tick::End), ControlFlow::Break(()))
            }
            Phase::Done => (None, ControlFlow::Break(())),
        }
    }
}

/// Drives a [`Sequence`] on a single [`TimerHandle`].
pub struct RepeatingNotifier {
    minutes_callback: ProgressCallback,
    seconds_callback: ProgressCallback,
    end_callback: EndCallback,
    timer: TimerHandle,
    epoch: Epoch,
}

impl RepeatingNotifier {
    pub fn new(
        minutes_callback: ProgressCallback,
        seconds_callback: ProgressCallback,
        end_callback: EndCallback,
    ) -> Self {
        Self {
            minutes_callback,
            seconds_callback,
            end_callback,
            timer: TimerHandle::new(),
            epoch: Epoch::new(),
        }
    }

    /// Starts ticking toward an end `seconds` from now.
    ///
    /// Returns `false` if a previous run is still in progress.
    pub fn call_every_minute_then_every_second(&mut self, seconds: u64) -> bool {
        self.tick_toward(Duration::from_secs(seconds))
    }

    /// Like [`call_every_minute_then_every_second`](Self::call_every_minute_then_every_second)
    /// for an end that is not a whole number of seconds away. The fraction is waited
    /// out before the first tick so the end still lands on `span`.
    pub fn tick_toward(&mut self, span: Duration) -> bool {
        if self.timer.is_running() {
            return false;
        }

        let plan = RepeatPlan::for_seconds(span.as_secs());
        let lead_in = Duration::from_nanos(span.subsec_nanos().into());
        log::debug!("[REPEATER] Starting {:?} [lead_in = {:?}]", plan, lead_in);

        let (mut sequence, first_delay) = Sequence::new(plan);
        let first_delay = first_delay + lead_in;
        let epoch = self.epoch.clone();
        let scheduled_in = epoch.current();
        let minutes_callback = self.minutes_callback.clone();
        let seconds_callback = self.seconds_callback.clone();
        let end_callback = self.end_callback.clone();

        self.timer.start(first_delay, move || {
            let (tick, next) = sequence.step();
            match tick {
                Some(Tick::Minute(left)) => {
                    let callback = minutes_callback.clone();
                    defer(&epoch, scheduled_in, move || callback(left));
                }
                Some(Tick::Second(left)) => {
                    let callback = seconds_callback.clone();
                    defer(&epoch, scheduled_in, move || callback(left));
                }
                Some(Tick::End) if epoch.is_current(scheduled_in) => end_callback(),
                Some(Tick::End) | None => {}
            }
            next
        })
    }

    pub fn reset(&mut self) {
        self.epoch.advance();
        self.timer.reset();
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}
