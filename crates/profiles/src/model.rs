//! Profile table wire model.
//!
//! ```json
//! {
//!   "users": { "Andii": { "todo": { "enabled": true, "list": ["..."] } } },
//!   "default": { "todo": { "enabled": false } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The whole profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileTable {
    /// Per-person profiles keyed by detector name. Matching ignores case.
    #[serde(default)]
    pub users: BTreeMap<String, UserProfile>,

    /// Fallback when no user entry matches.
    #[serde(default, deserialize_with = "empty_object_as_none")]
    pub default: Option<UserProfile>,
}

impl ProfileTable {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.default.is_none()
    }
}

/// One person's personalization settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo: Option<TodoSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarSettings>,

    /// Every other capability block (weather, news, greeting, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Name to show on screen: `displayName`, then `name`, then the given fallback.
    pub fn display_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Profile files written by hand often use `"default": {}` for "no default".
fn empty_object_as_none<'de, D>(deserializer: D) -> Result<Option<UserProfile>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(other) => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_profile() {
        let json = r#"{
            "users": {
                "Andii": {
                    "name": "Andii",
                    "displayName": "Andii B.",
                    "todo": {"enabled": true, "list": ["milk", "gym"]},
                    "calendar": {"enabled": true, "urls": ["https://example.com/a.ics"], "maxEntries": 3, "symbol": "calendar"},
                    "weather": {"enabled": true, "location": "Ulaanbaatar"}
                }
            },
            "default": {"todo": {"enabled": false}}
        }"#;
        let table: ProfileTable = serde_json::from_str(json).unwrap();

        let andii = &table.users["Andii"];
        assert_eq!(andii.display_name_or("x"), "Andii B.");
        assert_eq!(andii.todo.as_ref().unwrap().list, vec!["milk", "gym"]);
        let calendar = andii.calendar.as_ref().unwrap();
        assert_eq!(calendar.max_entries, Some(3));
        assert_eq!(calendar.extra["symbol"], "calendar");
        assert!(andii.extra.contains_key("weather"));
        assert!(table.default.is_some());
    }

    #[test]
    fn test_empty_default_is_none() {
        let table: ProfileTable = serde_json::from_str(r#"{"users": {}, "default": {}}"#).unwrap();
        assert!(table.default.is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_sections() {
        let table: ProfileTable = serde_json::from_str("{}").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let profile = UserProfile::default();
        assert_eq!(profile.display_name_or("zoe"), "zoe");

        let named = UserProfile {
            name: Some("Zoe".to_string()),
            ..Default::default()
        };
        assert_eq!(named.display_name_or("zoe"), "Zoe");
    }
}
