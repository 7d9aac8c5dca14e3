//! Resolved person identity.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Label the detector writes when a face was seen but not matched.
pub const UNKNOWN_PERSON: &str = "Unknown";

/// A person label resolved by the detector.
///
/// `"Unknown"` (any case) and empty labels never become an `Identity`.
/// Equality and hashing ignore case so `"Zoe"` and `"zoe"` are the same person.
#[derive(Debug, Clone)]
pub struct Identity {
    name: String,
    key: String,
}

impl Identity {
    /// Resolve a raw detector label. Returns `None` for absent, empty or unknown labels.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let name = raw?.trim();
        if name.is_empty() {
            return None;
        }
        let key = name.to_lowercase();
        if key == UNKNOWN_PERSON.to_lowercase() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            key,
        })
    }

    /// Label as written by the detector.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased matching key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Case-insensitive comparison against an arbitrary label.
    pub fn matches(&self, label: &str) -> bool {
        self.key == label.trim().to_lowercase()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for Identity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Identity::parse(Some(&raw))
            .ok_or_else(|| de::Error::custom(format!("'{raw}' is not a resolved identity")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_and_empty_are_not_identities() {
        assert!(Identity::parse(None).is_none());
        assert!(Identity::parse(Some("")).is_none());
        assert!(Identity::parse(Some("   ")).is_none());
        assert!(Identity::parse(Some("Unknown")).is_none());
        assert!(Identity::parse(Some("unknown")).is_none());
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = Identity::parse(Some("Andii")).unwrap();
        let b = Identity::parse(Some("ANDII")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name(), "Andii");
        assert!(a.matches(" andii "));
    }

    #[test]
    fn test_non_ascii_names_fold_case() {
        let a = Identity::parse(Some("Болд")).unwrap();
        let b = Identity::parse(Some("болд")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserialize_rejects_unknown() {
        let ok: Identity = serde_json::from_str("\"Zoe\"").unwrap();
        assert_eq!(ok.name(), "Zoe");
        assert!(serde_json::from_str::<Identity>("\"Unknown\"").is_err());
    }
}
