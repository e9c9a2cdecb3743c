mod common;
mod countdown;
mod repeater;
mod timer_handle;

pub use common::{EndCallback, Epoch, ProgressCallback};
pub use countdown::{CountdownEngine, Notification, Role};
pub use repeater::{Phase, RepeatPlan, RepeatingNotifier, Sequence, Tick};
pub use timer_handle::{TimerControl, TimerHandle};
