//! Status poller - reads the shared record and always yields a snapshot.

use crate::snapshot::StatusSnapshot;
use crate::source::{SharedSource, SourceError};
use chrono::Utc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Intervals below this are clamped.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Log every Nth consecutive failure after the first.
const FAILURE_LOG_EVERY: u32 = 10;

/// Per-subscriber poller over a shared status source.
///
/// Read and parse failures never reach the caller: they degrade to
/// [`StatusSnapshot::nobody`] and are logged.
pub struct StatusPoller {
    source: SharedSource,
    interval: Duration,
    consecutive_failures: u32,
}

impl StatusPoller {
    pub fn new(source: SharedSource, interval: Duration) -> Self {
        Self {
            source,
            interval: interval.max(MIN_POLL_INTERVAL),
            consecutive_failures: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Consecutive failed reads since the last good one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Ticker for this poller's interval. The first tick completes immediately.
    pub fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Read the source once.
    pub async fn poll(&mut self) -> StatusSnapshot {
        let now = Utc::now();
        match self.source.fetch().await {
            Ok(record) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        source = %self.source.describe(),
                        failures = self.consecutive_failures,
                        "status record readable again"
                    );
                }
                self.consecutive_failures = 0;
                record.into_snapshot(now)
            }
            Err(e) => {
                self.note_failure(&e);
                StatusSnapshot::nobody(now)
            }
        }
    }

    fn note_failure(&mut self, error: &SourceError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;

        if matches!(error, SourceError::Missing) {
            if failures == 1 {
                tracing::debug!(source = %self.source.describe(), "status record missing, assuming nobody present");
            }
            return;
        }

        // Rate-limit: first failure, then every 10th
        if failures == 1 || failures % FAILURE_LOG_EVERY == 0 {
            tracing::warn!(
                source = %self.source.describe(),
                failures,
                error = %error,
                "status read failed, assuming nobody present"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{StatusRecord, NOBODY_DISTANCE};
    use crate::source::{FileStatusSource, MemorySource, NullSource};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_nobody() {
        let dir = tempdir().unwrap();
        let source = Arc::new(FileStatusSource::new(dir.path().join("status.json")));
        let mut poller = StatusPoller::new(source, DEFAULT_POLL_INTERVAL);

        let snapshot = poller.poll().await;
        assert_eq!(snapshot.distance, NOBODY_DISTANCE);
        assert_eq!(snapshot.person, None);
        assert!(!snapshot.active);
        assert_eq!(poller.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_torn_write_is_nobody() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, "{\"distance\": 10, \"person\": \"An").unwrap();
        let mut poller = StatusPoller::new(Arc::new(FileStatusSource::new(&path)), DEFAULT_POLL_INTERVAL);

        let snapshot = poller.poll().await;
        assert_eq!(snapshot.distance, NOBODY_DISTANCE);
        assert!(!snapshot.active);
    }

    #[tokio::test]
    async fn test_recovery_resets_failures() {
        let source = Arc::new(MemorySource::new());
        let mut poller = StatusPoller::new(source.clone(), DEFAULT_POLL_INTERVAL);

        poller.poll().await;
        poller.poll().await;
        assert_eq!(poller.consecutive_failures(), 2);

        source.set(StatusRecord {
            distance: Some(14.0),
            person: Some("Andii".to_string()),
            active: Some(true),
            timestamp: None,
        });
        let snapshot = poller.poll().await;
        assert_eq!(poller.consecutive_failures(), 0);
        assert_eq!(snapshot.distance, 14.0);
        assert!(snapshot.active);
    }

    #[test]
    fn test_interval_is_clamped() {
        let poller = StatusPoller::new(Arc::new(NullSource), Duration::ZERO);
        assert_eq!(poller.interval(), MIN_POLL_INTERVAL);
    }
}
