//! Subscriber lifecycle contract.
//!
//! The hub only depends on this trait: widgets, the stdout forwarder and test
//! recorders are all just subscribers.

use mirrorsense_bus::{Envelope, Interest};
use mirrorsense_events::MirrorEvent;
use mirrorsense_presence::{PresenceConfig, DEFAULT_POLL_INTERVAL};
use mirrorsense_profiles::Capability;
use std::time::Duration;

/// Envelope type carried by the hub's bus.
pub type MirrorEnvelope = Envelope<MirrorEvent>;

/// How the hub runs one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberSettings {
    /// Poll interval of this subscriber's own poller.
    pub poll_interval: Duration,
    /// Threshold and timer durations for this subscriber's state machine.
    pub presence: PresenceConfig,
    /// Profile capabilities resolved into transition events.
    pub capabilities: Vec<Capability>,
    pub interest: Interest,
    /// Run a poller and state machine for this subscriber.
    pub tracks_presence: bool,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            presence: PresenceConfig::default(),
            capabilities: Vec::new(),
            interest: Interest::Own,
            tracks_presence: true,
        }
    }
}

impl SubscriberSettings {
    /// Passive listener on every event, with no presence pipeline of its own.
    pub fn observer() -> Self {
        Self {
            interest: Interest::All,
            tracks_presence: false,
            ..Self::default()
        }
    }
}

/// A widget (or any other consumer) attached to the hub.
///
/// Callbacks run on the subscriber's own task, one event at a time.
pub trait Subscriber: Send + 'static {
    fn id(&self) -> &str;

    fn settings(&self) -> SubscriberSettings;

    /// Called when the hub starts (or resumes) this subscriber.
    fn start(&mut self) {}

    /// Called when the hub suspends or removes this subscriber.
    fn stop(&mut self) {}

    fn on_event(&mut self, envelope: &MirrorEnvelope);
}
