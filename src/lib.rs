//! Countdown alarm scheduling: an end instant, progress notifications on the way
//! there, and a single expiry callback.

pub mod alarm_clock;
pub mod appsettings;
pub mod clock;
pub mod minute_timer;
pub mod scheduling;

pub use alarm_clock::AlarmClock;
pub use clock::{Clock, SystemClock, TokioClock};
pub use minute_timer::MinuteTimer;
