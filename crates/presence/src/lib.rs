//! Presence tracking for mirrorsense.
//!
//! This crate turns the shared "who is in front of the mirror" status record
//! into discrete presence transitions. It tracks:
//! - Proximity (is someone closer than the subscriber's threshold)
//! - Identity (has the detector matched a known face)
//! - Departure and shutdown timing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Layer                             │
//! │  identity.rs - Identity newtype (case-insensitive)          │
//! │  snapshot.rs - StatusRecord wire format, StatusSnapshot     │
//! │  machine.rs  - Phase enum and transition function (pure)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                        │
//! │  source.rs - File / HTTP / memoized status sources          │
//! │  timers.rs - Scheduler trait, tokio + virtual schedulers    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Layer                          │
//! │  poller.rs  - Interval reads that never fail                │
//! │  tracker.rs - Applies machine actions to the timer manager  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mirrorsense_presence::{FileStatusSource, PresenceConfig, PresenceTracker, StatusPoller, TokioScheduler};
//! use std::sync::Arc;
//!
//! let source = Arc::new(FileStatusSource::new("/tmp/magicmirror_face_status.json"));
//! let mut poller = StatusPoller::new(source, std::time::Duration::from_secs(1));
//! let (scheduler, _fired) = TokioScheduler::channel();
//! let mut tracker = PresenceTracker::new(PresenceConfig::default(), scheduler);
//!
//! let snapshot = poller.poll().await;
//! for notification in tracker.handle_snapshot(&snapshot) {
//!     println!("{notification:?}");
//! }
//! ```

mod identity;
mod machine;
mod poller;
mod snapshot;
mod source;
mod timers;
mod tracker;

pub use identity::{Identity, UNKNOWN_PERSON};
pub use machine::{
    step, Action, Input, Phase, PresenceConfig, PresenceState, TimerKind, TransitionEvent,
    TransitionKind, DEFAULT_GREETING_DURATION, DEFAULT_PROXIMITY_THRESHOLD,
    DEFAULT_SHUTDOWN_DELAY, SHUTDOWN_REASON_TIMEOUT,
};
pub use poller::{StatusPoller, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use snapshot::{parse_record, RecordTimestamp, StatusRecord, StatusSnapshot, NOBODY_DISTANCE};
pub use source::{
    FileStatusSource, HttpStatusSource, MemoizedSource, MemorySource, NullSource, SharedSource,
    SourceError, StatusSource, DEFAULT_STATUS_FILE,
};
pub use timers::{Scheduler, TimerManager, TimerToken, TokioScheduler, VirtualScheduler};
pub use tracker::{Notification, PresenceTracker};
