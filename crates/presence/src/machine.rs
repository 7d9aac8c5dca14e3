//! Presence phases and the transition function.
//!
//! Pure domain logic - no I/O, no clocks, no timers. [`step`] maps
//! `(state, input)` to `(state, actions)`; the tracker applies the actions.

use crate::identity::Identity;
use crate::snapshot::StatusSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default proximity threshold (cm).
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 20.0;

/// Default delay between departure and shutdown.
pub const DEFAULT_SHUTDOWN_DELAY: Duration = Duration::from_millis(10_000);

/// Default time a greeting stays on screen.
pub const DEFAULT_GREETING_DURATION: Duration = Duration::from_millis(5_000);

/// Reason attached to the shutdown action when the departure countdown elapses.
pub const SHUTDOWN_REASON_TIMEOUT: &str = "proximity_timeout";

/// Where a subscriber believes the person in front of the mirror is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nobody within threshold.
    #[default]
    Idle,

    /// Someone within threshold, not yet identified.
    Detected,

    /// Someone within threshold with a resolved identity.
    Recognized,

    /// Subject left; shutdown countdown running.
    Departing,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Detected => "detected",
            Phase::Recognized => "recognized",
            Phase::Departing => "departing",
        }
    }

    /// Someone is considered present.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Detected | Phase::Recognized)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Arrived,
    Departed,
    IdentityChanged,
    TimeoutExpired,
}

/// Discrete presence event emitted on a phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub kind: TransitionKind,
    pub person: Option<Identity>,
    pub distance: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    Greeting,
    Shutdown,
}

/// Per-subscriber tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceConfig {
    /// Distance (cm) below which a subject counts as present.
    pub proximity_threshold: f64,

    /// Countdown from departure to shutdown.
    pub shutdown_delay: Duration,

    /// How long a greeting stays up after recognition.
    pub greeting_duration: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            shutdown_delay: DEFAULT_SHUTDOWN_DELAY,
            greeting_duration: DEFAULT_GREETING_DURATION,
        }
    }
}

/// Per-subscriber presence state. Never shared between subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceState {
    pub phase: Phase,
    pub current_person: Option<Identity>,
    pub last_transition_at: DateTime<Utc>,
    /// Distance from the most recent snapshot.
    pub last_distance: f64,
    /// A greeting is on screen and its timer is running.
    pub greeting_visible: bool,
}

impl PresenceState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Idle,
            current_person: None,
            last_transition_at: now,
            last_distance: crate::snapshot::NOBODY_DISTANCE,
            greeting_visible: false,
        }
    }
}

/// What the state machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Snapshot(StatusSnapshot),
    TimerElapsed { kind: TimerKind, at: DateTime<Utc> },
}

impl Input {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Input::Snapshot(snapshot) => snapshot.timestamp,
            Input::TimerElapsed { at, .. } => *at,
        }
    }
}

/// Side effects requested by [`step`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Emit(TransitionEvent),
    StartTimer { kind: TimerKind, after: Duration },
    CancelTimer(TimerKind),
    ClearGreeting,
    Shutdown { reason: &'static str },
}

/// Advance the state machine by one input.
pub fn step(
    state: &PresenceState,
    input: &Input,
    config: &PresenceConfig,
) -> (PresenceState, Vec<Action>) {
    let mut next = state.clone();
    let mut actions = Vec::new();

    match input {
        Input::Snapshot(snapshot) => on_snapshot(&mut next, snapshot, config, &mut actions),
        Input::TimerElapsed { kind, at } => on_timer(&mut next, *kind, *at, &mut actions),
    }

    (next, actions)
}

fn on_snapshot(
    state: &mut PresenceState,
    snapshot: &StatusSnapshot,
    config: &PresenceConfig,
    actions: &mut Vec<Action>,
) {
    let within = snapshot.is_within(config.proximity_threshold);
    let at = snapshot.timestamp;
    state.last_distance = snapshot.distance;

    match (state.phase, within) {
        (Phase::Idle | Phase::Departing, false) => return,

        (Phase::Idle | Phase::Departing, true) => {
            if state.phase == Phase::Departing {
                actions.push(Action::CancelTimer(TimerKind::Shutdown));
            }
            state.phase = Phase::Detected;
            state.last_transition_at = at;
            actions.push(Action::Emit(TransitionEvent {
                kind: TransitionKind::Arrived,
                person: None,
                distance: snapshot.distance,
                at,
            }));
        }

        (Phase::Detected | Phase::Recognized, false) => {
            // Any identity on this snapshot is ignored until the next arrival.
            let departed = state.current_person.take();
            state.phase = Phase::Departing;
            state.last_transition_at = at;
            if state.greeting_visible {
                state.greeting_visible = false;
                actions.push(Action::CancelTimer(TimerKind::Greeting));
                actions.push(Action::ClearGreeting);
            }
            actions.push(Action::Emit(TransitionEvent {
                kind: TransitionKind::Departed,
                person: departed,
                distance: snapshot.distance,
                at,
            }));
            actions.push(Action::StartTimer {
                kind: TimerKind::Shutdown,
                after: config.shutdown_delay,
            });
            return;
        }

        (Phase::Detected | Phase::Recognized, true) => {}
    }

    // Within threshold and active. Unknown/absent labels keep the current person.
    let Some(identity) = snapshot.identity() else {
        return;
    };
    if state.current_person.as_ref() == Some(&identity) {
        return;
    }

    state.current_person = Some(identity.clone());
    state.phase = Phase::Recognized;
    state.last_transition_at = at;
    state.greeting_visible = true;
    actions.push(Action::Emit(TransitionEvent {
        kind: TransitionKind::IdentityChanged,
        person: Some(identity),
        distance: snapshot.distance,
        at,
    }));
    actions.push(Action::StartTimer {
        kind: TimerKind::Greeting,
        after: config.greeting_duration,
    });
}

fn on_timer(state: &mut PresenceState, kind: TimerKind, at: DateTime<Utc>, actions: &mut Vec<Action>) {
    match kind {
        TimerKind::Shutdown => {
            if state.phase != Phase::Departing {
                return;
            }
            state.phase = Phase::Idle;
            state.current_person = None;
            state.last_transition_at = at;
            actions.push(Action::Emit(TransitionEvent {
                kind: TransitionKind::TimeoutExpired,
                person: None,
                distance: state.last_distance,
                at,
            }));
            actions.push(Action::Shutdown {
                reason: SHUTDOWN_REASON_TIMEOUT,
            });
        }
        TimerKind::Greeting => {
            // Identity stays current; only the greeting goes away.
            if state.greeting_visible {
                state.greeting_visible = false;
                actions.push(Action::ClearGreeting);
            }
        }
    }
}
