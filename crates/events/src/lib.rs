//! Shared event contracts for presence fan-out.
//!
//! This crate defines the formal contracts (DTOs) for events that flow from
//! a subscriber's presence pipeline to widgets and out to the host process.
//! Using shared types prevents runtime deserialization errors from
//! mismatched field names.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;
mod personal;

pub use bus::{
    emit_event, EmittedEvent, EventBus, EventBusRef, InMemoryEventBus, JsonLinesEventBus,
    NullEventBus,
};
pub use personal::{
    PersonalDataset, PersonalEvent, PersonalList, PersonalListItem, PersonalSummary, PersonalUser,
};

use chrono::{DateTime, Utc};
use mirrorsense_presence::{Identity, StatusSnapshot, TransitionEvent, TransitionKind};
use mirrorsense_profiles::{
    lookup, Capability, CapabilityLookup, ProfileSource, ProfileTable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw status as seen by one subscriber's poller.
///
/// Producers: presence pipeline (only when the observation changes)
/// Consumers: overlay widget, host process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub distance: f64,
    #[serde(default)]
    pub person: Option<String>,
    pub active: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&StatusSnapshot> for StatusEvent {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            distance: snapshot.distance,
            person: snapshot.person.clone(),
            active: snapshot.active,
            timestamp: snapshot.timestamp,
        }
    }
}

/// Profile subset resolved for one person and one subscriber's capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personalization {
    #[serde(default)]
    pub person: Option<Identity>,
    pub profile: ProfileSource,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Keyed by capability name. Disabled capabilities are present as `Disabled`.
    #[serde(default)]
    pub capabilities: BTreeMap<String, CapabilityLookup>,
}

impl Personalization {
    /// Resolve `identity` against `table` for the given capabilities.
    pub fn resolve(
        table: &ProfileTable,
        identity: Option<&Identity>,
        capabilities: &[Capability],
    ) -> Self {
        let resolved = lookup(table, identity);
        Self {
            person: identity.cloned(),
            display_name: identity
                .map(|id| resolved.profile.display_name_or(id.name()).to_string()),
            capabilities: capabilities
                .iter()
                .map(|cap| (cap.name().to_string(), resolved.capability(cap)))
                .collect(),
            profile: resolved.source,
        }
    }

    /// Lookup result for `capability`; `Disabled` if it was not requested.
    pub fn capability(&self, capability: &Capability) -> &CapabilityLookup {
        static DISABLED: CapabilityLookup = CapabilityLookup::Disabled;
        self.capabilities.get(capability.name()).unwrap_or(&DISABLED)
    }
}

/// A presence transition plus, where it applies, the personalization for it.
///
/// Producers: presence pipeline
/// Consumers: widgets, host process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionNotice {
    #[serde(flatten)]
    pub event: TransitionEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization: Option<Personalization>,
}

/// Greeting display window elapsed or greeting withdrawn on departure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreetingClearedEvent {
    pub at: DateTime<Utc>,
}

/// Departure countdown elapsed; the mirror should go idle.
///
/// Producers: presence pipeline
/// Consumers: host process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownEvent {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Profile table reloaded; carries the fresh personalization for the current person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRefreshedEvent {
    pub generation: u64,
    pub personalization: Personalization,
}

/// Remote personal data fetch failed. Distinct from "nobody present".
///
/// Producers: personal data fetcher
/// Consumers: personal API widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalDataErrorEvent {
    pub error: String,
}

/// Everything that travels over the fan-out bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MirrorEvent {
    Status(StatusEvent),
    Transition(TransitionNotice),
    GreetingCleared(GreetingClearedEvent),
    Shutdown(ShutdownEvent),
    ProfileRefreshed(ProfileRefreshedEvent),
    PersonalData(PersonalDataset),
    PersonalDataError(PersonalDataErrorEvent),
}

impl MirrorEvent {
    /// Topic name used when the event leaves the process.
    pub fn topic(&self) -> &'static str {
        match self {
            MirrorEvent::Status(_) => event_names::PRESENCE_STATUS,
            MirrorEvent::Transition(notice) => match notice.event.kind {
                TransitionKind::Arrived => event_names::PRESENCE_ARRIVED,
                TransitionKind::Departed => event_names::PRESENCE_DEPARTED,
                TransitionKind::IdentityChanged => event_names::PRESENCE_IDENTITY_CHANGED,
                TransitionKind::TimeoutExpired => event_names::PRESENCE_TIMEOUT_EXPIRED,
            },
            MirrorEvent::GreetingCleared(_) => event_names::GREETING_CLEARED,
            MirrorEvent::Shutdown(_) => event_names::PRESENCE_SHUTDOWN,
            MirrorEvent::ProfileRefreshed(_) => event_names::PROFILE_REFRESHED,
            MirrorEvent::PersonalData(_) => event_names::PERSONAL_DATA,
            MirrorEvent::PersonalDataError(_) => event_names::PERSONAL_ERROR,
        }
    }

    /// JSON payload without the enum tag.
    pub fn payload(&self) -> serde_json::Value {
        let result = match self {
            MirrorEvent::Status(e) => serde_json::to_value(e),
            MirrorEvent::Transition(e) => serde_json::to_value(e),
            MirrorEvent::GreetingCleared(e) => serde_json::to_value(e),
            MirrorEvent::Shutdown(e) => serde_json::to_value(e),
            MirrorEvent::ProfileRefreshed(e) => serde_json::to_value(e),
            MirrorEvent::PersonalData(e) => serde_json::to_value(e),
            MirrorEvent::PersonalDataError(e) => serde_json::to_value(e),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(topic = self.topic(), error = %e, "Failed to serialize event payload");
            serde_json::Value::Null
        })
    }
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Raw status rebroadcast.
    pub const PRESENCE_STATUS: &str = "presence:status";
    /// Someone came within threshold.
    pub const PRESENCE_ARRIVED: &str = "presence:arrived";
    /// Someone left the threshold.
    pub const PRESENCE_DEPARTED: &str = "presence:departed";
    /// A (new) person was recognized.
    pub const PRESENCE_IDENTITY_CHANGED: &str = "presence:identity_changed";
    /// Departure countdown elapsed.
    pub const PRESENCE_TIMEOUT_EXPIRED: &str = "presence:timeout_expired";
    /// Mirror should go idle.
    pub const PRESENCE_SHUTDOWN: &str = "presence:shutdown";
    /// Greeting removed from screen.
    pub const GREETING_CLEARED: &str = "greeting:cleared";
    /// Profile table reloaded.
    pub const PROFILE_REFRESHED: &str = "profiles:refreshed";
    /// Remote personal data fetched.
    pub const PERSONAL_DATA: &str = "personal:data";
    /// Remote personal data fetch failed.
    pub const PERSONAL_ERROR: &str = "personal:error";
}
