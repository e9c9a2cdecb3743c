use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Callback receiving the number of periods (or ticks) still to go.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Callback fired once when a countdown runs out.
pub type EndCallback = Arc<dyn Fn() + Send + Sync>;

/// Generation counter shared between an owner and the work it has queued.
///
/// Every reset advances it; queued work remembers the generation it was scheduled
/// under and is dropped if that generation is no longer current.
#[derive(Debug, Clone, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }
}

/// Runs `f` on a later turn of the runtime, never on the caller's stack.
///
/// Skipped if `epoch` has moved past `scheduled_in` by the time the task runs.
pub fn defer(epoch: &Epoch, scheduled_in: u64, f: impl FnOnce() + Send + 'static) {
    let epoch = epoch.clone();
    tokio::spawn(async move {
        if epoch.is_current(scheduled_in) {
            f();
        } else {
            log::debug!(
                "Dropping deferred callback from a stale epoch. [scheduled_in = {}, current = {}]",
                scheduled_in,
                epoch.current()
            );
        }
    });
}
