//! Remote personal-data contracts.
//!
//! Shape of the personal API response:
//! `{ "users": [{ "name", "events": [...], "lists": [...] }], "summary": {...} }`

use mirrorsense_presence::Identity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalDataset {
    #[serde(default)]
    pub users: Vec<PersonalUser>,
    #[serde(default)]
    pub summary: PersonalSummary,
}

impl PersonalDataset {
    /// Entry for `identity`, matched case-insensitively.
    pub fn user(&self, identity: &Identity) -> Option<&PersonalUser> {
        self.users.iter().find(|u| identity.matches(&u.name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalUser {
    pub name: String,
    #[serde(default)]
    pub events: Vec<PersonalEvent>,
    #[serde(default)]
    pub lists: Vec<PersonalList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalList {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_date: Option<String>,
    #[serde(default)]
    pub items: Vec<PersonalListItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalListItem {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalSummary {
    #[serde(default)]
    pub total_events: u64,
    #[serde(default)]
    pub total_lists: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_response() {
        let json = r##"{
            "users": [
                {
                    "name": "Andii",
                    "events": [{"title": "Dentist", "startDate": "2026-03-02T09:00:00Z", "color": "#ff0000"}],
                    "lists": [{"title": "Groceries", "listDate": "2026-03-01", "items": [{"title": "milk", "completed": true}, {"title": "eggs"}]}]
                }
            ],
            "summary": {"totalEvents": 1, "totalLists": 1}
        }"##;
        let data: PersonalDataset = serde_json::from_str(json).unwrap();
        assert_eq!(data.summary.total_events, 1);
        let andii = &data.users[0];
        assert_eq!(andii.events[0].start_date.as_deref(), Some("2026-03-02T09:00:00Z"));
        assert!(andii.lists[0].items[0].completed);
        assert!(!andii.lists[0].items[1].completed);
    }

    #[test]
    fn test_user_lookup_ignores_case() {
        let data = PersonalDataset {
            users: vec![PersonalUser {
                name: "Andii".to_string(),
                ..Default::default()
            }],
            summary: PersonalSummary::default(),
        };
        let id = Identity::parse(Some("ANDII")).unwrap();
        assert!(data.user(&id).is_some());
        let other = Identity::parse(Some("Zoe")).unwrap();
        assert!(data.user(&other).is_none());
    }
}
