//! Presence tracker - drives the state machine and owns its timers.

use crate::machine::{self, Action, Input, PresenceConfig, PresenceState, TransitionEvent};
use crate::snapshot::StatusSnapshot;
use crate::timers::{Scheduler, TimerManager, TimerToken};
use chrono::{DateTime, Utc};

/// Outcome of one tracker step, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Transition(TransitionEvent),
    GreetingCleared { at: DateTime<Utc> },
    Shutdown { reason: &'static str, at: DateTime<Utc> },
}

/// One subscriber's presence state plus its greeting and shutdown timers.
///
/// Inputs are processed strictly one at a time; the tracker is owned by a
/// single task and never shared.
pub struct PresenceTracker<S> {
    config: PresenceConfig,
    state: PresenceState,
    timers: TimerManager<S>,
}

impl<S: Scheduler> PresenceTracker<S> {
    pub fn new(config: PresenceConfig, scheduler: S) -> Self {
        Self {
            config,
            state: PresenceState::new(Utc::now()),
            timers: TimerManager::new(scheduler),
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn timers(&self) -> &TimerManager<S> {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerManager<S> {
        &mut self.timers
    }

    pub fn handle_snapshot(&mut self, snapshot: &StatusSnapshot) -> Vec<Notification> {
        self.apply(Input::Snapshot(snapshot.clone()))
    }

    /// Handle a fired timer. Stale tokens (canceled or superseded) are dropped.
    pub fn handle_timer(&mut self, token: TimerToken, at: DateTime<Utc>) -> Vec<Notification> {
        if !self.timers.accept(token) {
            tracing::debug!(kind = ?token.kind, id = token.id, "ignoring stale timer");
            return Vec::new();
        }
        self.apply(Input::TimerElapsed {
            kind: token.kind,
            at,
        })
    }

    /// Cancel all timers and start over from idle.
    pub fn reset(&mut self) {
        self.timers.cancel_all();
        self.state = PresenceState::new(Utc::now());
    }

    fn apply(&mut self, input: Input) -> Vec<Notification> {
        let at = input.at();
        let (next, actions) = machine::step(&self.state, &input, &self.config);

        if next.phase != self.state.phase {
            tracing::debug!(from = %self.state.phase, to = %next.phase, "presence phase changed");
        }
        self.state = next;

        let mut notifications = Vec::new();
        for action in actions {
            match action {
                Action::Emit(event) => {
                    tracing::info!(
                        kind = ?event.kind,
                        person = ?event.person.as_ref().map(|p| p.name()),
                        distance = event.distance,
                        "presence transition"
                    );
                    notifications.push(Notification::Transition(event));
                }
                Action::StartTimer { kind, after } => {
                    self.timers.start(kind, after);
                }
                Action::CancelTimer(kind) => {
                    self.timers.cancel(kind);
                }
                Action::ClearGreeting => notifications.push(Notification::GreetingCleared { at }),
                Action::Shutdown { reason } => {
                    notifications.push(Notification::Shutdown { reason, at });
                }
            }
        }
        notifications
    }
}
