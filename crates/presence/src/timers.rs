//! Cancelable one-shot timers.
//!
//! A [`Scheduler`] hands out [`TimerToken`]s and later reports them as fired.
//! [`TimerManager`] keeps at most one live token per [`TimerKind`] and rejects
//! stale tokens, so a cancel that races a fire never produces a duplicate.

use crate::machine::TimerKind;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle for one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub id: u64,
}

/// Schedules timers whose expiry is delivered back to the owner as a token.
pub trait Scheduler: Send {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerToken;
    fn cancel(&mut self, token: TimerToken);
}

/// At most one active timer of each kind.
#[derive(Debug)]
pub struct TimerManager<S> {
    scheduler: S,
    greeting: Option<TimerToken>,
    shutdown: Option<TimerToken>,
}

impl<S: Scheduler> TimerManager<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            greeting: None,
            shutdown: None,
        }
    }

    /// Start a timer, canceling any running timer of the same kind first.
    pub fn start(&mut self, kind: TimerKind, after: Duration) -> TimerToken {
        let slot = match kind {
            TimerKind::Greeting => &mut self.greeting,
            TimerKind::Shutdown => &mut self.shutdown,
        };
        if let Some(previous) = slot.take() {
            self.scheduler.cancel(previous);
        }
        let token = self.scheduler.schedule(kind, after);
        *slot = Some(token);
        token
    }

    /// Cancel the running timer of `kind`. Returns whether one was running.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let slot = match kind {
            TimerKind::Greeting => &mut self.greeting,
            TimerKind::Shutdown => &mut self.shutdown,
        };
        match slot.take() {
            Some(token) => {
                self.scheduler.cancel(token);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::Greeting);
        self.cancel(TimerKind::Shutdown);
    }

    /// Accept a fired token. Returns `false` for canceled or superseded timers.
    pub fn accept(&mut self, token: TimerToken) -> bool {
        let slot = match token.kind {
            TimerKind::Greeting => &mut self.greeting,
            TimerKind::Shutdown => &mut self.shutdown,
        };
        if *slot == Some(token) {
            *slot = None;
            // Lets the scheduler drop its bookkeeping for the finished timer.
            self.scheduler.cancel(token);
            true
        } else {
            false
        }
    }

    pub fn is_active(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Greeting => self.greeting.is_some(),
            TimerKind::Shutdown => self.shutdown.is_some(),
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

/// Scheduler backed by tokio tasks.
///
/// Each timer is a sleeping task that sends its token on expiry. Canceling
/// aborts the task; dropping the scheduler aborts every pending timer.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerToken>,
    tasks: HashMap<u64, JoinHandle<()>>,
    next_id: u64,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<TimerToken>) -> Self {
        Self {
            tx,
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    /// Create a scheduler together with the receiver its timers fire into.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Number of timers not yet fired or canceled.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerToken {
        self.tasks.retain(|_, handle| !handle.is_finished());

        let token = TimerToken {
            kind,
            id: self.next_id,
        };
        self.next_id += 1;

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(token);
        });
        self.tasks.insert(token.id, handle);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(handle) = self.tasks.remove(&token.id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

/// Deterministic scheduler driven by a virtual clock.
#[derive(Debug, Default)]
pub struct VirtualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<(Duration, TimerToken)>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_of(&self, kind: TimerKind) -> usize {
        self.pending.iter().filter(|(_, t)| t.kind == kind).count()
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|(due, _)| *due).min()
    }

    /// Move the clock forward and return the timers that came due, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerToken> {
        self.now += by;
        let now = self.now;
        let mut due: Vec<_> = self
            .pending
            .iter()
            .filter(|(at, _)| *at <= now)
            .copied()
            .collect();
        self.pending.retain(|(at, _)| *at > now);
        due.sort_by_key(|(at, token)| (*at, token.id));
        due.into_iter().map(|(_, token)| token).collect()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerToken {
        let token = TimerToken {
            kind,
            id: self.next_id,
        };
        self.next_id += 1;
        self.pending.push((self.now + after, token));
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        self.pending.retain(|(_, t)| *t != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_replaces_running_timer() {
        let mut timers = TimerManager::new(VirtualScheduler::new());
        let first = timers.start(TimerKind::Greeting, Duration::from_secs(5));
        let second = timers.start(TimerKind::Greeting, Duration::from_secs(5));

        assert_ne!(first, second);
        assert_eq!(timers.scheduler().pending_of(TimerKind::Greeting), 1);
        assert!(!timers.accept(first));
        assert!(timers.accept(second));
        assert!(!timers.is_active(TimerKind::Greeting));
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut timers = TimerManager::new(VirtualScheduler::new());
        timers.start(TimerKind::Greeting, Duration::from_secs(5));
        timers.start(TimerKind::Shutdown, Duration::from_secs(10));
        assert!(timers.cancel(TimerKind::Greeting));
        assert!(timers.is_active(TimerKind::Shutdown));
        assert_eq!(timers.scheduler().pending(), 1);
    }

    #[test]
    fn test_cancel_all() {
        let mut timers = TimerManager::new(VirtualScheduler::new());
        timers.start(TimerKind::Greeting, Duration::from_secs(5));
        timers.start(TimerKind::Shutdown, Duration::from_secs(10));
        timers.cancel_all();
        assert_eq!(timers.scheduler().pending(), 0);
        assert!(!timers.cancel(TimerKind::Shutdown));
    }

    #[test]
    fn test_virtual_advance_orders_by_due_time() {
        let mut scheduler = VirtualScheduler::new();
        let late = scheduler.schedule(TimerKind::Shutdown, Duration::from_secs(10));
        let early = scheduler.schedule(TimerKind::Greeting, Duration::from_secs(5));

        assert!(scheduler.advance(Duration::from_secs(4)).is_empty());
        assert_eq!(scheduler.advance(Duration::from_secs(10)), vec![early, late]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires() {
        let (scheduler, mut fired) = TokioScheduler::channel();
        let mut timers = TimerManager::new(scheduler);
        let token = timers.start(TimerKind::Shutdown, Duration::from_millis(100));

        let got = fired.recv().await.unwrap();
        assert_eq!(got, token);
        assert!(timers.accept(got));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel_prevents_fire() {
        let (scheduler, mut fired) = TokioScheduler::channel();
        let mut timers = TimerManager::new(scheduler);
        timers.start(TimerKind::Shutdown, Duration::from_millis(100));
        timers.cancel(TimerKind::Shutdown);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_restart_fires_once() {
        let (scheduler, mut fired) = TokioScheduler::channel();
        let mut timers = TimerManager::new(scheduler);
        timers.start(TimerKind::Greeting, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let live = timers.start(TimerKind::Greeting, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.try_recv().unwrap(), live);
        assert!(fired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_aborts_timers() {
        let (scheduler, mut fired) = TokioScheduler::channel();
        let mut timers = TimerManager::new(scheduler);
        timers.start(TimerKind::Shutdown, Duration::from_millis(100));
        drop(timers);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.try_recv().is_err());
    }
}
