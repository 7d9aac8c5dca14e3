//! Per-subscriber presence pipeline.
//!
//! One task per subscriber: poll → state machine → personalization → bus.
//! Poll ticks and timer expiries are handled strictly one at a time, so the
//! tracker is never touched concurrently.

use crate::subscriber::SubscriberSettings;
use chrono::Utc;
use mirrorsense_bus::FanoutBus;
use mirrorsense_events::{
    GreetingClearedEvent, MirrorEvent, Personalization, ProfileRefreshedEvent, ShutdownEvent,
    StatusEvent, TransitionNotice,
};
use mirrorsense_presence::{
    Notification, PresenceTracker, Scheduler, SharedSource, StatusPoller, StatusSnapshot,
    TokioScheduler, TransitionKind,
};
use mirrorsense_profiles::ProfileStoreRef;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one pipeline needs. Cloned per run.
#[derive(Clone)]
pub(crate) struct PipelineContext {
    pub id: Arc<str>,
    pub settings: SubscriberSettings,
    pub source: SharedSource,
    pub profiles: ProfileStoreRef,
    pub bus: FanoutBus<MirrorEvent>,
}

/// Publishes one subscriber's pipeline output.
pub(crate) struct Publisher {
    ctx: PipelineContext,
    last_status: Option<StatusSnapshot>,
    profile_generation: u64,
}

impl Publisher {
    pub fn new(ctx: PipelineContext) -> Self {
        let profile_generation = ctx.profiles.generation();
        Self {
            ctx,
            last_status: None,
            profile_generation,
        }
    }

    fn publish(&self, event: MirrorEvent) {
        self.ctx.bus.publish(Some(&*self.ctx.id), event);
    }

    /// Rebroadcast the raw status when the observation changed.
    pub fn status(&mut self, snapshot: &StatusSnapshot) {
        let changed = self
            .last_status
            .as_ref()
            .map_or(true, |last| !last.same_observation(snapshot));
        if changed {
            self.publish(MirrorEvent::Status(StatusEvent::from(snapshot)));
            self.last_status = Some(snapshot.clone());
        }
    }

    pub fn notifications(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let event = match notification {
                Notification::Transition(event) => {
                    let personalization = match event.kind {
                        TransitionKind::IdentityChanged => Some(self.personalize(event.person.as_ref())),
                        _ => None,
                    };
                    MirrorEvent::Transition(TransitionNotice {
                        event,
                        personalization,
                    })
                }
                Notification::GreetingCleared { at } => {
                    MirrorEvent::GreetingCleared(GreetingClearedEvent { at })
                }
                Notification::Shutdown { reason, at } => {
                    tracing::info!(subscriber = %self.ctx.id, reason, "presence timeout, requesting shutdown");
                    MirrorEvent::Shutdown(ShutdownEvent {
                        reason: reason.to_string(),
                        at,
                    })
                }
            };
            self.publish(event);
        }
    }

    /// Re-resolve the current person after a profile reload.
    pub fn profiles<S: Scheduler>(&mut self, tracker: &PresenceTracker<S>) {
        let generation = self.ctx.profiles.generation();
        if generation == self.profile_generation {
            return;
        }
        self.profile_generation = generation;

        let personalization = self.personalize(tracker.state().current_person.as_ref());
        tracing::debug!(subscriber = %self.ctx.id, generation, "profile table changed");
        self.publish(MirrorEvent::ProfileRefreshed(ProfileRefreshedEvent {
            generation,
            personalization,
        }));
    }

    fn personalize(&self, person: Option<&mirrorsense_presence::Identity>) -> Personalization {
        let table = self.ctx.profiles.snapshot();
        Personalization::resolve(&table, person, &self.ctx.settings.capabilities)
    }
}

/// Run until `cancel` fires. Dropping the tracker on exit aborts both timers.
pub(crate) async fn run(ctx: PipelineContext, cancel: CancellationToken) {
    let mut poller = StatusPoller::new(ctx.source.clone(), ctx.settings.poll_interval);
    let (scheduler, mut fired) = TokioScheduler::channel();
    let mut tracker = PresenceTracker::new(ctx.settings.presence.clone(), scheduler);
    let mut ticker = poller.ticker();
    let id = ctx.id.clone();
    let mut publisher = Publisher::new(ctx);

    tracing::info!(
        subscriber = %id,
        interval = ?poller.interval(),
        threshold = tracker.config().proximity_threshold,
        "presence pipeline started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(token) = fired.recv() => {
                let notifications = tracker.handle_timer(token, Utc::now());
                publisher.notifications(notifications);
            }
            _ = ticker.tick() => {
                let snapshot = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    snapshot = poller.poll() => snapshot,
                };
                publisher.status(&snapshot);
                let notifications = tracker.handle_snapshot(&snapshot);
                publisher.notifications(notifications);
                publisher.profiles(&tracker);
            }
        }
    }

    tracker.reset();
    tracing::info!(subscriber = %id, "presence pipeline stopped");
}
