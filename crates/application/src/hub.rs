//! Presence hub - runs subscribers and their pipelines.
//!
//! Each joined subscriber gets a bus mailbox, a listener task that feeds it
//! events, and (if it tracks presence) its own poller and state machine.
//! Suspending tears all of that down and waits for it; resuming starts fresh
//! from `Idle`.

use crate::error::HubError;
use crate::pipeline::{self, PipelineContext};
use crate::subscriber::Subscriber;
use futures::future::join_all;
use mirrorsense_bus::{BusConfig, FanoutBus, Subscription};
use mirrorsense_events::MirrorEvent;
use mirrorsense_presence::SharedSource;
use mirrorsense_profiles::ProfileStoreRef;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type BoxedSubscriber = Box<dyn Subscriber>;

struct Running {
    cancel: CancellationToken,
    pipeline: Option<JoinHandle<()>>,
    listener: JoinHandle<BoxedSubscriber>,
}

enum Member {
    Running(Running),
    Suspended(BoxedSubscriber),
    /// The listener task died; the subscriber went with it.
    Failed { reason: String },
}

struct Stopped {
    subscriber: Result<BoxedSubscriber, HubError>,
    pipeline: Result<(), HubError>,
}

pub struct PresenceHub {
    bus: FanoutBus<MirrorEvent>,
    source: SharedSource,
    profiles: ProfileStoreRef,
    members: BTreeMap<String, Member>,
}

impl PresenceHub {
    pub fn new(source: SharedSource, profiles: ProfileStoreRef) -> Self {
        Self::with_bus(source, profiles, FanoutBus::with_config(BusConfig::default()))
    }

    pub fn with_bus(
        source: SharedSource,
        profiles: ProfileStoreRef,
        bus: FanoutBus<MirrorEvent>,
    ) -> Self {
        Self {
            bus,
            source,
            profiles,
            members: BTreeMap::new(),
        }
    }

    pub fn bus(&self) -> &FanoutBus<MirrorEvent> {
        &self.bus
    }

    /// Ids of all members, running or suspended.
    pub fn members(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    pub fn is_running(&self, id: &str) -> bool {
        matches!(self.members.get(id), Some(Member::Running(_)))
    }

    pub fn is_failed(&self, id: &str) -> bool {
        matches!(self.members.get(id), Some(Member::Failed { .. }))
    }

    /// Add a subscriber and start it.
    pub fn join(&mut self, subscriber: BoxedSubscriber) -> Result<(), HubError> {
        let id = subscriber.id().to_string();
        if self.members.contains_key(&id) {
            return Err(HubError::AlreadyJoined(id));
        }
        let running = self.launch(subscriber)?;
        self.members.insert(id, Member::Running(running));
        Ok(())
    }

    /// Stop a subscriber and hand it back.
    ///
    /// A failed member is removed and its failure returned.
    pub async fn leave(&mut self, id: &str) -> Result<BoxedSubscriber, HubError> {
        let suspended = self.suspend(id).await;
        match self.members.remove(id) {
            Some(Member::Suspended(subscriber)) => {
                tracing::info!(subscriber = %id, "Subscriber left");
                Ok(subscriber)
            }
            Some(Member::Failed { reason }) => {
                tracing::info!(subscriber = %id, reason = %reason, "Failed subscriber removed");
                Err(HubError::TaskFailed(reason))
            }
            Some(Member::Running(_)) | None => Err(suspended
                .err()
                .unwrap_or_else(|| HubError::UnknownSubscriber(id.to_string()))),
        }
    }

    /// Stop a subscriber's pipeline, timers and listener.
    ///
    /// When this returns nothing more is delivered to the subscriber.
    pub async fn suspend(&mut self, id: &str) -> Result<(), HubError> {
        let member = self
            .members
            .remove(id)
            .ok_or_else(|| HubError::UnknownSubscriber(id.to_string()))?;
        let running = match member {
            Member::Running(running) => running,
            Member::Failed { reason } => {
                let err = HubError::TaskFailed(reason.clone());
                self.members.insert(id.to_string(), Member::Failed { reason });
                return Err(err);
            }
            suspended @ Member::Suspended(_) => {
                self.members.insert(id.to_string(), suspended);
                return Ok(());
            }
        };

        self.bus.unsubscribe(id);
        let stopped = stop(running).await;
        self.settle(id.to_string(), stopped.subscriber)?;
        tracing::info!(subscriber = %id, "Subscriber suspended");
        // The subscriber itself survived a pipeline failure and can be resumed.
        stopped.pipeline
    }

    /// Restart a suspended subscriber from `Idle`.
    pub fn resume(&mut self, id: &str) -> Result<(), HubError> {
        let member = self
            .members
            .remove(id)
            .ok_or_else(|| HubError::UnknownSubscriber(id.to_string()))?;
        let subscriber = match member {
            Member::Suspended(subscriber) => subscriber,
            Member::Failed { reason } => {
                let err = HubError::TaskFailed(reason.clone());
                self.members.insert(id.to_string(), Member::Failed { reason });
                return Err(err);
            }
            running @ Member::Running(_) => {
                self.members.insert(id.to_string(), running);
                return Ok(());
            }
        };

        let running = self.launch(subscriber)?;
        tracing::info!(subscriber = %id, "Subscriber resumed");
        self.members.insert(id.to_string(), Member::Running(running));
        Ok(())
    }

    /// Suspend every running subscriber.
    pub async fn shutdown(&mut self) {
        let running: Vec<(String, Running)> = std::mem::take(&mut self.members)
            .into_iter()
            .filter_map(|(id, member)| match member {
                Member::Running(running) => Some((id, running)),
                other => {
                    self.members.insert(id, other);
                    None
                }
            })
            .collect();

        for (id, _) in &running {
            self.bus.unsubscribe(id);
        }
        let stopped = join_all(
            running
                .into_iter()
                .map(|(id, running)| async move { (id, stop(running).await) }),
        )
        .await;

        for (id, stopped) in stopped {
            if let Err(e) = stopped.pipeline {
                tracing::error!(subscriber = %id, error = %e, "Pipeline did not stop cleanly");
            }
            let _ = self.settle(id, stopped.subscriber);
        }
        tracing::info!(members = self.members.len(), "Presence hub stopped");
    }

    /// Store a stopped subscriber, or record why it is gone.
    fn settle(&mut self, id: String, subscriber: Result<BoxedSubscriber, HubError>) -> Result<(), HubError> {
        match subscriber {
            Ok(subscriber) => {
                self.members.insert(id, Member::Suspended(subscriber));
                Ok(())
            }
            Err(e) => {
                tracing::error!(subscriber = %id, error = %e, "Subscriber task failed");
                self.members.insert(
                    id,
                    Member::Failed {
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    fn launch(&self, mut subscriber: BoxedSubscriber) -> Result<Running, HubError> {
        let settings = subscriber.settings();
        let id: Arc<str> = Arc::from(subscriber.id());

        // Mailbox first so the pipeline's first events are not missed.
        let subscription = self.bus.subscribe(&id, settings.interest)?;
        let cancel = CancellationToken::new();

        subscriber.start();
        let listener = tokio::spawn(listen(subscriber, subscription, cancel.child_token()));

        let pipeline = settings.tracks_presence.then(|| {
            let ctx = PipelineContext {
                id: id.clone(),
                settings: settings.clone(),
                source: self.source.clone(),
                profiles: self.profiles.clone(),
                bus: self.bus.clone(),
            };
            tokio::spawn(pipeline::run(ctx, cancel.child_token()))
        });

        tracing::debug!(
            subscriber = %id,
            tracks_presence = settings.tracks_presence,
            interest = ?settings.interest,
            "Subscriber started"
        );
        Ok(Running {
            cancel,
            pipeline,
            listener,
        })
    }
}

async fn stop(running: Running) -> Stopped {
    running.cancel.cancel();
    let pipeline = match running.pipeline {
        Some(pipeline) => pipeline
            .await
            .map_err(|e| HubError::TaskFailed(e.to_string())),
        None => Ok(()),
    };
    let subscriber = running
        .listener
        .await
        .map(|mut subscriber| {
            subscriber.stop();
            subscriber
        })
        .map_err(|e| HubError::TaskFailed(e.to_string()));
    Stopped {
        subscriber,
        pipeline,
    }
}

async fn listen(
    mut subscriber: BoxedSubscriber,
    mut subscription: Subscription<MirrorEvent>,
    cancel: CancellationToken,
) -> BoxedSubscriber {
    loop {
        let envelope = tokio::select! {
            biased;  // Check cancellation first
            _ = cancel.cancelled() => break,
            envelope = subscription.recv() => envelope,
        };
        let Some(envelope) = envelope else {
            break;
        };
        subscriber.on_event(&envelope);
    }

    if subscription.gaps_detected() > 0 {
        tracing::warn!(
            subscriber = %subscription.id(),
            missed = subscription.gaps_detected(),
            "Subscriber missed events while its mailbox was full"
        );
    }
    subscriber
}
