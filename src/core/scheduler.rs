//! One-shot timers behind a trait, so the playback loop can run on a real
//! event loop or on a virtual clock.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Identifies one armed timer. Tokens are never reused by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

/// Arms and cancels one-shot timers.
///
/// Firing is delivered out of band: whoever drives the scheduler hands the
/// token back to its owner (see `PlaybackEngine::on_timer`).
pub trait Scheduler {
    fn arm(&mut self, delay: Duration) -> TimerToken;

    /// Cancel a timer. Unknown or already-fired tokens are ignored.
    fn cancel(&mut self, token: TimerToken);
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    next_token: u64,
    pending: FxHashMap<TimerToken, Duration>,
}

/// A virtual clock. Time only moves when the owner says so.
///
/// Clones share the same clock and timer table.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// moving the clock to its deadline. Ties fire in arming order.
    pub fn pop_due(&self, until: Duration) -> Option<TimerToken> {
        let mut state = self.state.borrow_mut();
        let (token, deadline) = state
            .pending
            .iter()
            .filter(|(_, &deadline)| deadline <= until)
            .min_by_key(|(token, &deadline)| (deadline, **token))
            .map(|(&token, &deadline)| (token, deadline))?;
        state.pending.remove(&token);
        if deadline > state.now {
            state.now = deadline;
        }
        Some(token)
    }

    /// Move the clock forward to `until` without firing anything.
    pub fn settle(&self, until: Duration) {
        let mut state = self.state.borrow_mut();
        if until > state.now {
            state.now = until;
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.state.borrow().pending.contains_key(&token)
    }

    pub fn deadline(&self, token: TimerToken) -> Option<Duration> {
        self.state.borrow().pending.get(&token).copied()
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&mut self, delay: Duration) -> TimerToken {
        let mut state = self.state.borrow_mut();
        let token = TimerToken(state.next_token);
        state.next_token += 1;
        let deadline = state.now + delay;
        state.pending.insert(token, deadline);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        self.state.borrow_mut().pending.remove(&token);
    }
}

#[cfg(feature = "runtime")]
pub use self::tokio_timers::TokioScheduler;

#[cfg(feature = "runtime")]
mod tokio_timers {
    use super::{Scheduler, TimerToken};
    use rustc_hash::FxHashMap;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Timers on the tokio runtime. Each armed timer is a sleeping task that
    /// posts its token to the channel returned by [`TokioScheduler::new`].
    ///
    /// Must be used from inside a runtime. Clones share the timer table.
    #[derive(Debug, Clone)]
    pub struct TokioScheduler {
        tx: mpsc::UnboundedSender<TimerToken>,
        tasks: Rc<RefCell<FxHashMap<TimerToken, JoinHandle<()>>>>,
        next_token: Rc<Cell<u64>>,
    }

    impl TokioScheduler {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let scheduler = Self {
                tx,
                tasks: Rc::default(),
                next_token: Rc::default(),
            };
            (scheduler, rx)
        }

        /// Timers armed and not yet finished or cancelled.
        pub fn active_count(&self) -> usize {
            self.tasks
                .borrow()
                .values()
                .filter(|h| !h.is_finished())
                .count()
        }
    }

    impl Scheduler for TokioScheduler {
        fn arm(&mut self, delay: Duration) -> TimerToken {
            let token = TimerToken(self.next_token.get());
            self.next_token.set(token.0 + 1);

            let tx = self.tx.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // The receiver is gone only when the event loop has shut down.
                let _ = tx.send(token);
            });

            let mut tasks = self.tasks.borrow_mut();
            tasks.retain(|_, h| !h.is_finished());
            tasks.insert(token, handle);
            token
        }

        fn cancel(&mut self, token: TimerToken) {
            if let Some(handle) = self.tasks.borrow_mut().remove(&token) {
                handle.abort();
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn armed_timer_delivers_token_after_delay() {
            let (mut scheduler, mut rx) = TokioScheduler::new();
            let start = tokio::time::Instant::now();
            let token = scheduler.arm(Duration::from_millis(2500));

            assert_eq!(rx.recv().await, Some(token));
            assert!(start.elapsed() >= Duration::from_millis(2500));
        }

        #[tokio::test(start_paused = true)]
        async fn cancelled_timer_never_fires() {
            let (mut scheduler, mut rx) = TokioScheduler::new();
            let stale = scheduler.arm(Duration::from_millis(10));
            scheduler.cancel(stale);
            let live = scheduler.arm(Duration::from_millis(20));

            assert_eq!(rx.recv().await, Some(live));
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(rx.try_recv().is_err());
            assert_eq!(scheduler.active_count(), 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timers_fire_in_deadline_order() {
        let mut timers = ManualScheduler::new();
        let late = timers.arm(Duration::from_millis(300));
        let early = timers.arm(Duration::from_millis(100));
        let tie = timers.arm(Duration::from_millis(100));

        let until = Duration::from_millis(1000);
        assert_eq!(timers.pop_due(until), Some(early));
        assert_eq!(timers.now(), Duration::from_millis(100));
        assert_eq!(timers.pop_due(until), Some(tie));
        assert_eq!(timers.pop_due(until), Some(late));
        assert_eq!(timers.now(), Duration::from_millis(300));
        assert_eq!(timers.pop_due(until), None);

        timers.settle(until);
        assert_eq!(timers.now(), until);
    }

    #[test]
    fn timers_not_yet_due_stay_pending() {
        let mut timers = ManualScheduler::new();
        let token = timers.arm(Duration::from_millis(2500));
        assert_eq!(timers.pop_due(Duration::from_millis(2499)), None);
        assert!(timers.is_pending(token));
        assert_eq!(timers.deadline(token), Some(Duration::from_millis(2500)));
        assert_eq!(timers.pop_due(Duration::from_millis(2500)), Some(token));
    }

    #[test]
    fn cancel_removes_timer_and_clones_share_state() {
        let mut timers = ManualScheduler::new();
        let observer = timers.clone();
        let token = timers.arm(Duration::from_millis(10));
        assert_eq!(observer.pending_count(), 1);

        timers.cancel(token);
        timers.cancel(token);
        assert_eq!(observer.pending_count(), 0);
        assert_eq!(observer.pop_due(Duration::from_secs(60)), None);
    }

    #[test]
    fn deadlines_are_relative_to_virtual_now() {
        let mut timers = ManualScheduler::new();
        timers.settle(Duration::from_millis(5000));
        let token = timers.arm(Duration::from_millis(2500));
        assert_eq!(timers.deadline(token), Some(Duration::from_millis(7500)));
    }
}
