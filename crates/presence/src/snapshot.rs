//! Status record wire format and normalized snapshots.

use crate::identity::{Identity, UNKNOWN_PERSON};
use crate::source::SourceError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distance reported when nobody is in front of the mirror (cm).
///
/// Larger than any sensible proximity threshold.
pub const NOBODY_DISTANCE: f64 = 999.0;

/// Timestamp as the detector writes it: epoch milliseconds or ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordTimestamp {
    EpochMillis(f64),
    Text(String),
}

impl RecordTimestamp {
    /// Convert to a UTC instant, if the value is recognizable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordTimestamp::EpochMillis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(*ms as i64)
            }
            RecordTimestamp::EpochMillis(_) => None,
            RecordTimestamp::Text(text) => parse_text_timestamp(text.trim()),
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    // Python's isoformat() without an offset
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    text.parse::<f64>()
        .ok()
        .and_then(|ms| RecordTimestamp::EpochMillis(ms).to_datetime())
}

/// The shared status record written by the external detector.
///
/// Every field is optional on the wire; see [`StatusRecord::into_snapshot`]
/// for how gaps are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub person: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<RecordTimestamp>,
}

impl StatusRecord {
    /// Normalize into a snapshot, stamping `now` where the record has no usable time.
    pub fn into_snapshot(self, now: DateTime<Utc>) -> StatusSnapshot {
        let distance = self
            .distance
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(NOBODY_DISTANCE);

        let person = self
            .person
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        StatusSnapshot {
            distance,
            person,
            active: self.active.unwrap_or(false),
            timestamp: self
                .timestamp
                .as_ref()
                .and_then(RecordTimestamp::to_datetime)
                .unwrap_or(now),
        }
    }
}

/// Parse raw bytes into a status record.
///
/// A torn or partial write surfaces here as [`SourceError::Malformed`].
pub fn parse_record(bytes: &[u8]) -> Result<StatusRecord, SourceError> {
    serde_json::from_slice(bytes).map_err(|e| SourceError::Malformed(e.to_string()))
}

/// One normalized reading of the status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Distance to the subject in cm (≥ 0).
    pub distance: f64,

    /// Raw person label, including `"Unknown"`.
    pub person: Option<String>,

    /// Detector believes a subject is within range.
    pub active: bool,

    pub timestamp: DateTime<Utc>,
}

impl StatusSnapshot {
    /// The "nobody present" snapshot used whenever the record cannot be read.
    pub fn nobody(now: DateTime<Utc>) -> Self {
        Self {
            distance: NOBODY_DISTANCE,
            person: None,
            active: false,
            timestamp: now,
        }
    }

    /// Resolved identity, if the label names a known person.
    pub fn identity(&self) -> Option<Identity> {
        Identity::parse(self.person.as_deref())
    }

    /// A face was seen but the detector could not match it.
    pub fn is_unknown_face(&self) -> bool {
        self.person
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(UNKNOWN_PERSON))
    }

    pub fn is_within(&self, threshold: f64) -> bool {
        self.distance < threshold
    }

    /// Same observation ignoring the timestamp.
    pub fn same_observation(&self, other: &StatusSnapshot) -> bool {
        self.distance == other.distance && self.person == other.person && self.active == other.active
    }
}
