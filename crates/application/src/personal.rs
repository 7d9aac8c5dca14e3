//! Remote personal data (calendar events and lists from the personal API).
//!
//! The fetcher broadcasts every result on the bus; widgets pick out the
//! current person themselves. A failed fetch becomes a `personal:error`
//! event rather than looking like "nobody here".

use crate::error::PersonalDataError;
use async_trait::async_trait;
use mirrorsense_bus::FanoutBus;
use mirrorsense_events::{MirrorEvent, PersonalDataErrorEvent, PersonalDataset};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait PersonalDataSource: Send + Sync {
    async fn fetch(&self) -> Result<PersonalDataset, PersonalDataError>;
}

pub type SharedPersonalSource = Arc<dyn PersonalDataSource>;

pub struct HttpPersonalDataSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPersonalDataSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PersonalDataSource for HttpPersonalDataSource {
    async fn fetch(&self) -> Result<PersonalDataset, PersonalDataError> {
        tracing::debug!(url = %self.url, "Fetching personal data");

        let response = self
            .client
            .get(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| PersonalDataError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersonalDataError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response
            .json::<PersonalDataset>()
            .await
            .map_err(|e| PersonalDataError::Decode(e.to_string()))
    }
}

/// Fetch once and broadcast the outcome.
pub async fn refresh_once(source: &dyn PersonalDataSource, bus: &FanoutBus<MirrorEvent>) {
    match source.fetch().await {
        Ok(data) => {
            tracing::info!(
                users = data.users.len(),
                events = data.summary.total_events,
                lists = data.summary.total_lists,
                "Fetched personal data"
            );
            bus.publish(None, MirrorEvent::PersonalData(data));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Personal data fetch failed");
            bus.publish(
                None,
                MirrorEvent::PersonalDataError(PersonalDataErrorEvent {
                    error: e.to_string(),
                }),
            );
        }
    }
}

/// Fetch immediately, then every `interval`, until `cancel` fires.
pub fn spawn_fetcher(
    source: SharedPersonalSource,
    bus: FanoutBus<MirrorEvent>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval = ?interval, "Personal data fetcher started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = refresh_once(source.as_ref(), &bus) => {}
                    }
                }
            }
        }
        tracing::info!("Personal data fetcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorsense_bus::Interest;
    use mirrorsense_events::PersonalUser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PersonalDataSource for Scripted {
        async fn fetch(&self) -> Result<PersonalDataset, PersonalDataError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(PersonalDataset {
                    users: vec![PersonalUser {
                        name: "Andii".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                })
            } else {
                Err(PersonalDataError::Status {
                    status: 503,
                    reason: "Service Unavailable".to_string(),
                })
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetcher_publishes_data_then_error() {
        let bus = FanoutBus::new();
        let mut sub = bus.subscribe("w", Interest::Own).unwrap();
        let source = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();
        let task = spawn_fetcher(source, bus.clone(), Duration::from_secs(60), cancel.clone());

        tokio::time::sleep(Duration::from_secs(90)).await;
        cancel.cancel();
        task.await.unwrap();

        let first = sub.try_recv().unwrap();
        assert!(first.origin.is_none());
        assert!(matches!(&*first.payload, MirrorEvent::PersonalData(d) if d.users.len() == 1));

        let second = sub.try_recv().unwrap();
        match &*second.payload {
            MirrorEvent::PersonalDataError(e) => assert_eq!(e.error, "HTTP 503: Service Unavailable"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
