//! Integration tests for the presence crate.
//!
//! Drives the tracker with a virtual scheduler so timer behavior is
//! checked without real sleeps.

use chrono::{DateTime, TimeZone, Utc};
use mirrorsense_presence::{
    FileStatusSource, Notification, Phase, PresenceConfig, PresenceTracker, StatusPoller,
    StatusSnapshot, TimerKind, TransitionKind, VirtualScheduler, NOBODY_DISTANCE,
};
use std::sync::Arc;
use std::time::Duration;

const THRESHOLD: f64 = 20.0;
const SHUTDOWN_DELAY: Duration = Duration::from_millis(10_000);
const GREETING: Duration = Duration::from_millis(5_000);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

fn config() -> PresenceConfig {
    PresenceConfig {
        proximity_threshold: THRESHOLD,
        shutdown_delay: SHUTDOWN_DELAY,
        greeting_duration: GREETING,
    }
}

fn snapshot(distance: f64, person: Option<&str>, active: bool) -> StatusSnapshot {
    StatusSnapshot {
        distance,
        person: person.map(str::to_string),
        active,
        timestamp: t0(),
    }
}

fn transitions(notifications: &[Notification]) -> Vec<(TransitionKind, Option<String>)> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Transition(e) => {
                Some((e.kind, e.person.as_ref().map(|p| p.name().to_string())))
            }
            _ => None,
        })
        .collect()
}

fn fire_due(
    tracker: &mut PresenceTracker<VirtualScheduler>,
    by: Duration,
) -> Vec<Notification> {
    let fired = tracker.timers_mut().scheduler_mut().advance(by);
    fired
        .into_iter()
        .flat_map(|token| tracker.handle_timer(token, t0()))
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn test_arrival_then_recognition() {
        let mut tracker = PresenceTracker::new(config(), VirtualScheduler::new());
        let mut out = tracker.handle_snapshot(&snapshot(25.0, None, false));
        out.extend(tracker.handle_snapshot(&snapshot(10.0, Some("Andii"), true)));

        assert_eq!(
            transitions(&out),
            vec![
                (TransitionKind::Arrived, None),
                (TransitionKind::IdentityChanged, Some("Andii".to_string())),
            ]
        );
    }

    #[test]
    fn test_recognized_departure_times_out_once() {
        let mut tracker = PresenceTracker::new(config(), VirtualScheduler::new());
        tracker.handle_snapshot(&snapshot(10.0, Some("Andii"), true));

        let departed = tracker.handle_snapshot(&snapshot(30.0, None, false));
        assert_eq!(
            transitions(&departed),
            vec![(TransitionKind::Departed, Some("Andii".to_string()))]
        );

        let mut expired = Vec::new();
        for _ in 0..30 {
            expired.extend(fire_due(&mut tracker, Duration::from_millis(1_000)));
            expired.extend(tracker.handle_snapshot(&snapshot(30.0, None, false)));
        }
        assert_eq!(
            transitions(&expired),
            vec![(TransitionKind::TimeoutExpired, None)]
        );
    }

    #[tokio::test]
    async fn test_missing_status_file_reads_as_nobody() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FileStatusSource::new(dir.path().join("face_status.json")));
        let mut poller = StatusPoller::new(source, Duration::from_millis(500));

        let snapshot = poller.poll().await;
        assert_eq!(snapshot.distance, NOBODY_DISTANCE);
        assert_eq!(snapshot.distance, 999.0);
        assert_eq!(snapshot.person, None);
        assert!(!snapshot.active);
    }
}

// =============================================================================
// Exhaustive sequence properties
// =============================================================================

mod properties {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        See(f64, Option<&'static str>),
        Wait(u64),
    }

    const ALPHABET: &[Step] = &[
        Step::See(999.0, None),
        Step::See(10.0, None),
        Step::See(10.0, Some("Andii")),
        Step::See(10.0, Some("zoe")),
        Step::See(10.0, Some("Unknown")),
        Step::See(35.0, Some("Andii")),
        Step::Wait(3_000),
        Step::Wait(6_000),
        Step::Wait(11_000),
    ];

    const MAX_LEN: usize = 5;

    fn for_each_sequence(mut f: impl FnMut(&[Step])) {
        let mut indices = vec![0usize; 0];
        loop {
            if !indices.is_empty() {
                let seq: Vec<Step> = indices.iter().map(|&i| ALPHABET[i]).collect();
                f(&seq);
            }
            // Odometer increment over lengths 1..=MAX_LEN
            let mut pos = indices.len();
            loop {
                if pos == 0 {
                    if indices.len() == MAX_LEN {
                        return;
                    }
                    indices = vec![0; indices.len() + 1];
                    break;
                }
                pos -= 1;
                indices[pos] += 1;
                if indices[pos] < ALPHABET.len() {
                    break;
                }
                indices[pos] = 0;
            }
        }
    }

    struct Run {
        tracker: PresenceTracker<VirtualScheduler>,
        departed_at: Option<Duration>,
        timeouts_since_departure: usize,
    }

    impl Run {
        fn new() -> Self {
            Self {
                tracker: PresenceTracker::new(config(), VirtualScheduler::new()),
                departed_at: None,
                timeouts_since_departure: 0,
            }
        }

        fn now(&self) -> Duration {
            self.tracker.timers().scheduler().now()
        }

        fn observe(&mut self, notifications: &[Notification]) {
            for (kind, _) in transitions(notifications) {
                match kind {
                    TransitionKind::Departed => {
                        self.departed_at = Some(self.now());
                        self.timeouts_since_departure = 0;
                    }
                    TransitionKind::TimeoutExpired => {
                        let departed_at = self
                            .departed_at
                            .expect("timeout without a departure");
                        assert!(
                            self.now() - departed_at >= SHUTDOWN_DELAY,
                            "timeout fired early"
                        );
                        self.timeouts_since_departure += 1;
                        assert_eq!(self.timeouts_since_departure, 1, "duplicate timeout");
                    }
                    TransitionKind::Arrived => self.departed_at = None,
                    TransitionKind::IdentityChanged => {}
                }
            }
        }

        fn apply(&mut self, step: Step) -> Vec<Notification> {
            let out = match step {
                Step::See(distance, person) => self
                    .tracker
                    .handle_snapshot(&snapshot(distance, person, distance < THRESHOLD)),
                Step::Wait(ms) => fire_due(&mut self.tracker, Duration::from_millis(ms)),
            };
            self.observe(&out);
            out
        }

        fn check_timer_bounds(&self) {
            let scheduler = self.tracker.timers().scheduler();
            assert!(scheduler.pending_of(TimerKind::Greeting) <= 1);
            assert!(scheduler.pending_of(TimerKind::Shutdown) <= 1);
        }
    }

    #[test]
    fn test_never_two_timers_of_same_kind() {
        for_each_sequence(|seq| {
            let mut run = Run::new();
            for step in seq {
                run.apply(*step);
                run.check_timer_bounds();
            }
        });
    }

    #[test]
    fn test_repeated_snapshot_is_idempotent() {
        for_each_sequence(|seq| {
            let mut run = Run::new();
            for step in seq {
                run.apply(*step);
                if let Step::See(..) = step {
                    let again = run.apply(*step);
                    assert!(
                        transitions(&again).is_empty(),
                        "repeat emitted {:?} after {:?}",
                        again,
                        seq
                    );
                }
            }
        });
    }

    #[test]
    fn test_sustained_absence_times_out_exactly_once() {
        for_each_sequence(|seq| {
            let mut run = Run::new();
            for step in seq {
                run.apply(*step);
            }
            let engaged = run.tracker.state().phase != Phase::Idle;

            let mut tail = run.apply(Step::See(999.0, None));
            if engaged {
                let departed_at = run.departed_at.expect("departure recorded");
                assert_eq!(
                    run.tracker.timers().scheduler().next_due(),
                    Some(departed_at + SHUTDOWN_DELAY),
                    "countdown not armed for the full delay after {:?}",
                    seq
                );
            }
            for _ in 0..12 {
                tail.extend(run.apply(Step::Wait(1_000)));
                tail.extend(run.apply(Step::See(999.0, None)));
            }

            let timeouts = transitions(&tail)
                .iter()
                .filter(|(k, _)| *k == TransitionKind::TimeoutExpired)
                .count();
            assert_eq!(timeouts, usize::from(engaged), "after {:?}", seq);
            assert_eq!(run.tracker.state().phase, Phase::Idle);
            assert_eq!(run.tracker.timers().scheduler().pending(), 0);
        });
    }

    #[test]
    fn test_timeout_not_before_delay() {
        let mut run = Run::new();
        run.apply(Step::See(10.0, Some("Andii")));
        run.apply(Step::See(30.0, None));

        let early = run.apply(Step::Wait(SHUTDOWN_DELAY.as_millis() as u64 - 1));
        assert!(transitions(&early).is_empty());

        let on_time = run.apply(Step::Wait(1));
        assert_eq!(
            transitions(&on_time),
            vec![(TransitionKind::TimeoutExpired, None)]
        );
    }
}
