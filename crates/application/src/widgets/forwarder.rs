use crate::subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
use mirrorsense_events::{EventBusRef, MirrorEvent};
use mirrorsense_presence::TransitionKind;
use serde_json::Value;

/// Passes every bus event to an outer [`mirrorsense_events::EventBus`].
///
/// Object payloads gain a `subscriber` field naming the pipeline that
/// produced them (absent for broadcasts).
///
/// Every presence-tracking widget runs its own countdown, so one absence
/// yields one `presence:shutdown` per widget. The host only sees the first;
/// the rest are dropped until some pipeline reports a new arrival.
pub struct EventForwarder {
    id: String,
    sink: EventBusRef,
    shutdown_sent: bool,
}

impl EventForwarder {
    pub fn new(id: impl Into<String>, sink: EventBusRef) -> Self {
        Self {
            id: id.into(),
            sink,
            shutdown_sent: false,
        }
    }

    /// Whether this event goes out, updating the shutdown latch.
    fn admit(&mut self, envelope: &MirrorEnvelope) -> bool {
        match &*envelope.payload {
            MirrorEvent::Shutdown(_) if self.shutdown_sent => {
                tracing::debug!(origin = ?envelope.origin, "Duplicate shutdown collapsed");
                false
            }
            MirrorEvent::Shutdown(_) => {
                self.shutdown_sent = true;
                true
            }
            MirrorEvent::Transition(notice) if notice.event.kind == TransitionKind::Arrived => {
                self.shutdown_sent = false;
                true
            }
            _ => true,
        }
    }
}

impl Subscriber for EventForwarder {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> SubscriberSettings {
        SubscriberSettings::observer()
    }

    fn on_event(&mut self, envelope: &MirrorEnvelope) {
        if !self.admit(envelope) {
            return;
        }
        let mut payload = envelope.payload.payload();
        if let (Value::Object(map), Some(origin)) = (&mut payload, &envelope.origin) {
            map.insert("subscriber".to_string(), Value::String(origin.to_string()));
        }
        self.sink.emit(envelope.payload.topic(), payload);
    }
}
