use std::{ops::ControlFlow, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

/// What a timer callback returns: `Continue(next)` fires again `next` after the
/// previous deadline, `Break(())` ends the registration.
pub type TimerControl = ControlFlow<(), Duration>;

struct Registration {
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl Registration {
    fn cancel(self) {
        self.cancellation_token.cancel();
    }

    fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }
}

/// Owns at most one pending timer registration on the Tokio runtime.
///
/// Dropping a handle cancels whatever it still has pending.
#[derive(Default)]
pub struct TimerHandle {
    registration: Option<Registration>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the handle so `callback` runs once `delay` has elapsed.
    ///
    /// Returns `false` and leaves the existing schedule untouched if the handle is
    /// already running. Must be called from within a Tokio runtime.
    pub fn start<F>(&mut self, delay: Duration, mut callback: F) -> bool
    where
        F: FnMut() -> TimerControl + Send + 'static,
    {
        if self.is_running() {
            log::debug!("Timer is already running, keeping the existing registration.");
            return false;
        }

        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();
        let mut deadline = Instant::now() + delay;

        let task_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_cancellation_token.cancelled() => break,
                    _ = time::sleep_until(deadline) => {}
                }

                match callback() {
                    ControlFlow::Continue(next) => deadline += next,
                    ControlFlow::Break(()) => break,
                }
            }
        });

        self.registration = Some(Registration {
            task_handle,
            cancellation_token,
        });

        true
    }

    /// Cancels the pending registration, if any.
    pub fn reset(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.registration
            .as_ref()
            .is_some_and(|registration| !registration.is_finished())
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    type Hits = Arc<Mutex<Vec<u64>>>;

    fn hits() -> Hits {
        Arc::new(Mutex::new(vec![]))
    }

    fn recording(
        hits: &Hits,
        start: Instant,
        control: TimerControl,
    ) -> impl FnMut() -> TimerControl + Send + 'static {
        let hits = Arc::clone(hits);
        move || {
            hits.lock().unwrap().push(start.elapsed().as_secs());
            control
        }
    }

    fn once(hits: &Hits, start: Instant) -> impl FnMut() -> TimerControl + Send + 'static {
        recording(hits, start, ControlFlow::Break(()))
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once_after_delay() {
        let hits = hits();
        let start = Instant::now();
        let mut handle = TimerHandle::new();

        assert!(handle.start(Duration::from_secs(10), once(&hits, start)));

        time::sleep(Duration::from_secs(9)).await;
        assert!(hits.lock().unwrap().is_empty());

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(*hits.lock().unwrap(), vec![10]);
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_while_running() {
        let hits = hits();
        let start = Instant::now();
        let mut handle = TimerHandle::new();

        assert!(handle.start(Duration::from_secs(5), once(&hits, start)));
        assert!(!handle.start(Duration::from_secs(1), once(&hits, start)));

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*hits.lock().unwrap(), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn continue_repeats_from_previous_deadline() {
        let hits = hits();
        let start = Instant::now();
        let mut handle = TimerHandle::new();
        let mut left = 3;
        let hits_clone = Arc::clone(&hits);

        handle.start(Duration::from_secs(2), move || {
            hits_clone.lock().unwrap().push(start.elapsed().as_secs());
            left -= 1;
            if left > 0 {
                ControlFlow::Continue(Duration::from_secs(5))
            } else {
                ControlFlow::Break(())
            }
        });

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*hits.lock().unwrap(), vec![2, 7, 12]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_registration() {
        let hits = hits();
        let start = Instant::now();
        let mut handle = TimerHandle::new();

        handle.start(Duration::from_secs(5), once(&hits, start));
        handle.reset();
        handle.reset();

        time::sleep(Duration::from_secs(10)).await;
        assert!(hits.lock().unwrap().is_empty());
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_can_be_rearmed_after_reset() {
        let hits = hits();
        let start = Instant::now();
        let mut handle = TimerHandle::new();

        handle.start(Duration::from_secs(5), once(&hits, start));
        handle.reset();
        assert!(handle.start(Duration::from_secs(3), once(&hits, start)));

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*hits.lock().unwrap(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_registration() {
        let hits = hits();
        let start = Instant::now();
        {
            let mut handle = TimerHandle::new();
            handle.start(Duration::from_secs(5), once(&hits, start));
        }

        time::sleep(Duration::from_secs(10)).await;
        assert!(hits.lock().unwrap().is_empty());
    }
}
