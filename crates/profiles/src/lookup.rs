//! Personalization lookup.
//!
//! Pure functions over an already-loaded [`ProfileTable`]; no I/O.

use crate::model::{CalendarSettings, ProfileTable, TodoSettings, UserProfile};
use mirrorsense_presence::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A per-profile feature that carries an `enabled` flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    Todo,
    Calendar,
    /// Any other block in the profile (`weather`, `news`, ...).
    Other(String),
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Capability::Todo => "todo",
            Capability::Calendar => "calendar",
            Capability::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "todo" => Capability::Todo,
            "calendar" => Capability::Calendar,
            other => Capability::Other(other.to_string()),
        }
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        Capability::parse(&name)
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.name().to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a resolved profile came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "key", rename_all = "snake_case")]
pub enum ProfileSource {
    /// Matched a `users` entry; carries the entry's key as written in the table.
    User(String),
    /// Fell back to the table's `default`.
    Default,
    /// No match and no default.
    Empty,
}

/// Result of resolving an identity against the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile<'a> {
    pub source: ProfileSource,
    pub profile: &'a UserProfile,
}

/// Payload of an enabled capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", content = "data", rename_all = "lowercase")]
pub enum CapabilityData {
    Todo(TodoSettings),
    Calendar(CalendarSettings),
    Other(serde_json::Value),
}

/// Capability payload, or an explicit "render nothing".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "lowercase")]
pub enum CapabilityLookup {
    Enabled(CapabilityData),
    Disabled,
}

impl CapabilityLookup {
    pub fn is_enabled(&self) -> bool {
        matches!(self, CapabilityLookup::Enabled(_))
    }
}

fn empty_profile() -> &'static UserProfile {
    static EMPTY: OnceLock<UserProfile> = OnceLock::new();
    EMPTY.get_or_init(UserProfile::default)
}

/// Resolve the profile for `identity`.
///
/// Case-insensitive match against `users`, else `default`, else an empty
/// profile with every capability disabled. No identity resolves to `default`.
pub fn lookup<'a>(table: &'a ProfileTable, identity: Option<&Identity>) -> ResolvedProfile<'a> {
    if let Some(identity) = identity {
        // BTreeMap order makes the winner deterministic if two keys differ only by case.
        if let Some((key, profile)) = table.users.iter().find(|(key, _)| identity.matches(key)) {
            return ResolvedProfile {
                source: ProfileSource::User(key.clone()),
                profile,
            };
        }
    }

    match &table.default {
        Some(profile) => ResolvedProfile {
            source: ProfileSource::Default,
            profile,
        },
        None => ResolvedProfile {
            source: ProfileSource::Empty,
            profile: empty_profile(),
        },
    }
}

/// Payload for `capability`, only when the profile enables it.
pub fn capability(profile: &UserProfile, capability: &Capability) -> CapabilityLookup {
    match capability {
        Capability::Todo => match &profile.todo {
            Some(todo) if todo.enabled => CapabilityLookup::Enabled(CapabilityData::Todo(todo.clone())),
            _ => CapabilityLookup::Disabled,
        },
        Capability::Calendar => match &profile.calendar {
            Some(calendar) if calendar.enabled => {
                CapabilityLookup::Enabled(CapabilityData::Calendar(calendar.clone()))
            }
            _ => CapabilityLookup::Disabled,
        },
        Capability::Other(name) => {
            let Some(block) = profile.extra.get(name) else {
                return CapabilityLookup::Disabled;
            };
            let enabled = block
                .get("enabled")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            if enabled {
                CapabilityLookup::Enabled(CapabilityData::Other(block.clone()))
            } else {
                CapabilityLookup::Disabled
            }
        }
    }
}

impl ResolvedProfile<'_> {
    pub fn capability(&self, capability: &Capability) -> CapabilityLookup {
        self::capability(self.profile, capability)
    }
}
