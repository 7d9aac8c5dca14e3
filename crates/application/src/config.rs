//! Daemon configuration.
//!
//! JSON, camelCase keys. A missing file yields defaults; a malformed one is
//! an error.

use crate::error::ConfigError;
use crate::subscriber::SubscriberSettings;
use mirrorsense_bus::{Interest, DEFAULT_MAILBOX_CAPACITY};
use mirrorsense_presence::{PresenceConfig, DEFAULT_STATUS_FILE};
use mirrorsense_profiles::{Capability, DEFAULT_PROFILES_FILE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_OVERLAY_INTERVAL_MS: u64 = 500;
pub const DEFAULT_PERSONAL_REFRESH_MS: u64 = 5 * 60 * 1000;

/// Shared records are memoized for this long so widgets polling in the same
/// tick share one read.
pub const SOURCE_MEMO_TTL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,

    /// When set, `GET {statusEndpoint}/status` replaces the file.
    #[serde(default)]
    pub status_endpoint: Option<String>,

    #[serde(default = "default_profiles_file")]
    pub profiles_file: PathBuf,

    #[serde(default = "default_true")]
    pub watch_profiles: bool,

    #[serde(default)]
    pub personal_api: Option<PersonalApiConfig>,

    #[serde(default = "default_true")]
    pub memoize_source: bool,

    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    #[serde(default = "default_widgets")]
    pub widgets: Vec<WidgetConfig>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
            status_endpoint: None,
            profiles_file: default_profiles_file(),
            watch_profiles: true,
            personal_api: None,
            memoize_source: true,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            widgets: default_widgets(),
        }
    }
}

impl MirrorConfig {
    /// `<config dir>/mirrorsense/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mirrorsense").join("config.json"))
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), widgets = config.widgets.len(), "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, widget) in self.widgets.iter().enumerate() {
            let id = widget.id(index);
            if !seen.insert(id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate widget id '{id}'")));
            }
            if !(widget.proximity_threshold > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "widget '{id}': proximityThreshold must be positive"
                )));
            }
        }
        if let Some(api) = &self.personal_api {
            if api.enabled && api.url.trim().is_empty() {
                return Err(ConfigError::Invalid("personalApi.url is empty".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalApiConfig {
    pub url: String,
    #[serde(default = "default_personal_refresh_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl PersonalApiConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1000))
    }
}

/// One widget instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    #[serde(default)]
    pub id: Option<String>,

    /// Poll interval; defaults per kind.
    #[serde(default)]
    pub update_interval_ms: Option<u64>,

    #[serde(default = "default_threshold")]
    pub proximity_threshold: f64,

    #[serde(default = "default_timeout_delay_ms")]
    pub timeout_delay_ms: u64,

    #[serde(default = "default_greeting_duration_ms")]
    pub greeting_duration_ms: u64,

    #[serde(flatten)]
    pub options: WidgetOptions,
}

impl WidgetConfig {
    pub fn new(options: WidgetOptions) -> Self {
        Self {
            id: None,
            update_interval_ms: None,
            proximity_threshold: default_threshold(),
            timeout_delay_ms: default_timeout_delay_ms(),
            greeting_duration_ms: default_greeting_duration_ms(),
            options,
        }
    }

    /// Configured id, else `<kind>-<index>`.
    pub fn id(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}-{}", self.options.kind(), index),
        }
    }

    pub fn update_interval(&self) -> Duration {
        let default = match self.options {
            WidgetOptions::Overlay(_) => DEFAULT_OVERLAY_INTERVAL_MS,
            _ => DEFAULT_UPDATE_INTERVAL_MS,
        };
        Duration::from_millis(self.update_interval_ms.unwrap_or(default))
    }

    pub fn presence(&self) -> PresenceConfig {
        PresenceConfig {
            proximity_threshold: self.proximity_threshold,
            shutdown_delay: Duration::from_millis(self.timeout_delay_ms),
            greeting_duration: Duration::from_millis(self.greeting_duration_ms),
        }
    }

    pub fn subscriber_settings(&self) -> SubscriberSettings {
        let capabilities = match self.options {
            WidgetOptions::Todo(_) => vec![Capability::Todo],
            WidgetOptions::Calendar(_) => vec![Capability::Calendar],
            _ => Vec::new(),
        };
        SubscriberSettings {
            poll_interval: self.update_interval(),
            presence: self.presence(),
            capabilities,
            interest: Interest::Own,
            tracks_presence: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WidgetOptions {
    Greeting(GreetingOptions),
    Overlay(OverlayOptions),
    Todo(TodoOptions),
    Calendar(CalendarOptions),
    PersonalApi(PersonalApiOptions),
}

impl WidgetOptions {
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetOptions::Greeting(_) => "greeting",
            WidgetOptions::Overlay(_) => "overlay",
            WidgetOptions::Todo(_) => "todo",
            WidgetOptions::Calendar(_) => "calendar",
            WidgetOptions::PersonalApi(_) => "personalApi",
        }
    }
}

/// `{name}` in a template is replaced with the person's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GreetingOptions {
    pub default: String,
    /// Shown while an unmatched face is in front of the mirror.
    pub unknown: Option<String>,
    /// Per-person templates, keyed by detector name (case-insensitive).
    pub people: BTreeMap<String, String>,
}

impl Default for GreetingOptions {
    fn default() -> Self {
        Self {
            default: "Welcome {name}!".to_string(),
            unknown: None,
            people: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayOptions {
    pub waiting: String,
    pub detecting: String,
    /// `{name}` is replaced with the recognized person.
    pub recognized: String,
    pub unknown: String,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            waiting: "Waiting for face recognition...".to_string(),
            detecting: "Detecting...".to_string(),
            recognized: "Hello {name}".to_string(),
            unknown: "Unknown person".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TodoOptions {
    pub max_items: usize,
}

impl Default for TodoOptions {
    fn default() -> Self {
        Self { max_items: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalendarOptions {
    pub maximum_entries: usize,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self { maximum_entries: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalApiOptions {
    pub max_events: usize,
    pub max_lists: usize,
    pub show_completed: bool,
}

impl Default for PersonalApiOptions {
    fn default() -> Self {
        Self {
            max_events: 5,
            max_lists: 3,
            show_completed: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_status_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATUS_FILE)
}

fn default_profiles_file() -> PathBuf {
    PathBuf::from(DEFAULT_PROFILES_FILE)
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_personal_refresh_ms() -> u64 {
    DEFAULT_PERSONAL_REFRESH_MS
}

fn default_threshold() -> f64 {
    mirrorsense_presence::DEFAULT_PROXIMITY_THRESHOLD
}

fn default_timeout_delay_ms() -> u64 {
    mirrorsense_presence::DEFAULT_SHUTDOWN_DELAY.as_millis() as u64
}

fn default_greeting_duration_ms() -> u64 {
    mirrorsense_presence::DEFAULT_GREETING_DURATION.as_millis() as u64
}

fn default_widgets() -> Vec<WidgetConfig> {
    vec![
        WidgetConfig::new(WidgetOptions::Greeting(GreetingOptions::default())),
        WidgetConfig::new(WidgetOptions::Overlay(OverlayOptions::default())),
        WidgetConfig::new(WidgetOptions::Todo(TodoOptions::default())),
        WidgetConfig::new(WidgetOptions::Calendar(CalendarOptions::default())),
    ]
}
