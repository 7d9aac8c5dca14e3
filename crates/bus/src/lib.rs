//! Event fan-out bus for widget subscribers.
//!
//! Every subscriber owns a bounded mailbox. Publishing never waits: a full
//! mailbox drops the envelope for that subscriber only, so one slow widget
//! cannot hold up the others or the poll loop feeding the bus.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Default mailbox capacity per subscriber.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Log every Nth drop per mailbox.
const DROP_LOG_EVERY: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("subscriber already registered: {0}")]
    AlreadySubscribed(String),
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Which published events reach a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interest {
    /// Events published by this subscriber plus broadcasts.
    #[default]
    Own,
    /// Everything.
    All,
}

/// One delivered event.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    /// Per-mailbox sequence number. Gaps mean drops.
    pub seq: u64,
    /// Publishing subscriber; `None` for broadcasts.
    pub origin: Option<Arc<str>>,
    /// Wall clock at publish, milliseconds since epoch.
    pub ts_ms: i64,
    /// Shared between every mailbox the event went to.
    pub payload: Arc<T>,
}

/// Configuration for the fan-out bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub mailbox_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

struct Mailbox<T> {
    id: Arc<str>,
    interest: Interest,
    tx: mpsc::Sender<Envelope<T>>,
    next_seq: AtomicU64,
    dropped: AtomicU64,
}

impl<T> Mailbox<T> {
    fn wants(&self, origin: Option<&str>) -> bool {
        match (self.interest, origin) {
            (Interest::All, _) | (Interest::Own, None) => true,
            (Interest::Own, Some(origin)) => *self.id == *origin,
        }
    }
}

enum Delivery {
    Sent,
    Dropped,
    Closed,
}

struct Inner<T> {
    config: BusConfig,
    mailboxes: RwLock<Vec<Mailbox<T>>>,
    stats: BusStats,
}

/// Fan-out bus. Cheap to clone; clones share mailboxes.
pub struct FanoutBus<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for FanoutBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for FanoutBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FanoutBus<T> {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        let config = BusConfig {
            mailbox_capacity: config.mailbox_capacity.max(1),
        };
        tracing::debug!(capacity = config.mailbox_capacity, "Created fan-out bus");
        Self {
            inner: Arc::new(Inner {
                config,
                mailboxes: RwLock::new(Vec::new()),
                stats: BusStats::default(),
            }),
        }
    }

    /// Register a mailbox. Ids must be unique among current subscribers.
    pub fn subscribe(&self, id: &str, interest: Interest) -> Result<Subscription<T>> {
        let mut mailboxes = self
            .inner
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if mailboxes.iter().any(|m| &*m.id == id && !m.tx.is_closed()) {
            return Err(BusError::AlreadySubscribed(id.to_string()));
        }
        mailboxes.retain(|m| !m.tx.is_closed());

        let (tx, rx) = mpsc::channel(self.inner.config.mailbox_capacity);
        let id: Arc<str> = Arc::from(id);
        mailboxes.push(Mailbox {
            id: id.clone(),
            interest,
            tx,
            next_seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });
        tracing::debug!(subscriber = %id, ?interest, "Subscribed to bus");

        Ok(Subscription {
            id,
            rx,
            last_seq: None,
            gaps_detected: 0,
        })
    }

    /// Remove a mailbox. Anything still queued stays readable until the
    /// receiver is dropped; nothing new is delivered.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let mut mailboxes = self
            .inner
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = mailboxes.len();
        mailboxes.retain(|m| &*m.id != id);
        let removed = mailboxes.len() != before;
        if removed {
            tracing::debug!(subscriber = %id, "Unsubscribed from bus");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self) -> &BusStats {
        &self.inner.stats
    }

    /// Deliver `payload` to every interested mailbox without waiting.
    ///
    /// `origin` is the publishing subscriber, or `None` for a broadcast.
    pub fn publish(&self, origin: Option<&str>, payload: T) -> PublishReport {
        let payload = Arc::new(payload);
        let origin: Option<Arc<str>> = origin.map(Arc::from);
        let ts_ms = now_ms();
        let mut report = PublishReport::default();
        let mut saw_closed = false;

        {
            let mailboxes = self
                .inner
                .mailboxes
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for mailbox in mailboxes.iter().filter(|m| m.wants(origin.as_deref())) {
                let envelope = Envelope {
                    seq: mailbox.next_seq.fetch_add(1, Ordering::Relaxed),
                    origin: origin.clone(),
                    ts_ms,
                    payload: payload.clone(),
                };
                match deliver(mailbox, envelope) {
                    Delivery::Sent => report.delivered += 1,
                    Delivery::Dropped => report.dropped += 1,
                    Delivery::Closed => saw_closed = true,
                }
            }
        }

        if saw_closed {
            self.prune_closed();
        }

        let stats = &self.inner.stats;
        stats.published.fetch_add(1, Ordering::Relaxed);
        stats.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
        stats.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    fn prune_closed(&self) {
        let mut mailboxes = self
            .inner
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = mailboxes.len();
        mailboxes.retain(|m| !m.tx.is_closed());
        let pruned = (before - mailboxes.len()) as u64;
        if pruned > 0 {
            self.inner.stats.pruned.fetch_add(pruned, Ordering::Relaxed);
            tracing::debug!(pruned, "Pruned closed mailboxes");
        }
    }
}

fn deliver<T>(mailbox: &Mailbox<T>, envelope: Envelope<T>) -> Delivery {
    let seq = envelope.seq;
    match mailbox.tx.try_send(envelope) {
        Ok(()) => Delivery::Sent,
        Err(mpsc::error::TrySendError::Full(_)) => {
            let dropped = mailbox.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // Rate-limit logging: only log every 10th drop to avoid spam
            if dropped % DROP_LOG_EVERY == 1 {
                tracing::warn!(subscriber = %mailbox.id, dropped, seq, "Subscriber mailbox full, dropping events");
            }
            Delivery::Dropped
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!(subscriber = %mailbox.id, "Subscriber mailbox closed");
            Delivery::Closed
        }
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Receiving end of one mailbox.
pub struct Subscription<T> {
    id: Arc<str>,
    rx: mpsc::Receiver<Envelope<T>>,
    last_seq: Option<u64>,
    gaps_detected: u64,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receive the next envelope. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Envelope<T>> {
        let envelope = self.rx.recv().await?;
        self.track(envelope.seq);
        Some(envelope)
    }

    /// Try to receive an envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope<T>> {
        let envelope = self.rx.try_recv().ok()?;
        self.track(envelope.seq);
        Some(envelope)
    }

    /// Number of envelopes known to be missing (dropped while the mailbox was full).
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    /// Stop receiving; the bus prunes the mailbox on its next publish.
    pub fn close(&mut self) {
        self.rx.close();
    }

    fn track(&mut self, seq: u64) {
        let expected = self.last_seq.map_or(0, |last| last + 1);
        if seq > expected {
            let gap = seq - expected;
            self.gaps_detected += gap;
            tracing::debug!(
                subscriber = %self.id,
                gap,
                from = expected,
                to = seq,
                "Bus gap detected"
            );
        }
        self.last_seq = Some(seq);
    }
}

/// Bus-wide delivery counters.
#[derive(Debug, Default)]
pub struct BusStats {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    pruned: AtomicU64,
}

impl BusStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pruned(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            published: self.published(),
            delivered: self.delivered(),
            dropped: self.dropped(),
            pruned: self.pruned(),
        }
    }
}

/// Snapshot of bus counters for serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub pruned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_bus() -> FanoutBus<u32> {
        FanoutBus::with_config(BusConfig {
            mailbox_capacity: 2,
        })
    }

    #[tokio::test]
    async fn test_own_interest_filters_by_origin() {
        let bus = FanoutBus::new();
        let mut a = bus.subscribe("a", Interest::Own).unwrap();
        let mut b = bus.subscribe("b", Interest::Own).unwrap();

        bus.publish(Some("a"), 1);
        bus.publish(None, 2);

        assert_eq!(*a.recv().await.unwrap().payload, 1);
        assert_eq!(*a.recv().await.unwrap().payload, 2);
        assert_eq!(*b.recv().await.unwrap().payload, 2);
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_all_interest_sees_everything() {
        let bus = FanoutBus::new();
        let mut tap = bus.subscribe("tap", Interest::All).unwrap();

        bus.publish(Some("a"), 1);
        bus.publish(Some("b"), 2);

        let first = tap.recv().await.unwrap();
        assert_eq!(first.origin.as_deref(), Some("a"));
        assert_eq!(*tap.recv().await.unwrap().payload, 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let bus: FanoutBus<u32> = FanoutBus::new();
        let _a = bus.subscribe("a", Interest::Own).unwrap();
        assert!(matches!(
            bus.subscribe("a", Interest::Own),
            Err(BusError::AlreadySubscribed(_))
        ));
    }

    #[test]
    fn test_full_mailbox_drops_without_blocking_others() {
        let bus = small_bus();
        let _slow = bus.subscribe("slow", Interest::All).unwrap();
        let mut fast = bus.subscribe("fast", Interest::All).unwrap();

        for i in 0..5 {
            bus.publish(None, i);
            assert_eq!(*fast.try_recv().unwrap().payload, i);
        }

        assert_eq!(bus.stats().dropped(), 3);
        assert_eq!(bus.stats().delivered(), 7);
        assert_eq!(fast.gaps_detected(), 0);
    }

    #[test]
    fn test_gap_detection_after_drops() {
        let bus = small_bus();
        let mut sub = bus.subscribe("a", Interest::All).unwrap();

        for i in 0..4 {
            bus.publish(None, i);
        }
        assert_eq!(*sub.try_recv().unwrap().payload, 0);
        assert_eq!(*sub.try_recv().unwrap().payload, 1);

        bus.publish(None, 4);
        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.seq, 4);
        assert_eq!(sub.gaps_detected(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = FanoutBus::new();
        let mut sub = bus.subscribe("a", Interest::Own).unwrap();
        bus.publish(None, 1);
        assert!(bus.unsubscribe("a"));
        bus.publish(None, 2);

        assert_eq!(*sub.try_recv().unwrap().payload, 1);
        assert!(sub.try_recv().is_none());
        assert!(!bus.unsubscribe("a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_closed_mailbox_is_pruned() {
        let bus = FanoutBus::new();
        let sub = bus.subscribe("a", Interest::Own).unwrap();
        drop(sub);

        let report = bus.publish(None, 1);
        assert_eq!(report, PublishReport::default());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.stats().pruned(), 1);
    }

    #[test]
    fn test_resubscribe_after_drop() {
        let bus: FanoutBus<u32> = FanoutBus::new();
        let sub = bus.subscribe("a", Interest::Own).unwrap();
        drop(sub);
        assert!(bus.subscribe("a", Interest::Own).is_ok());
    }

    #[tokio::test]
    async fn test_payload_is_shared() {
        let bus = FanoutBus::new();
        let mut a = bus.subscribe("a", Interest::All).unwrap();
        let mut b = bus.subscribe("b", Interest::All).unwrap();
        bus.publish(None, String::from("hello"));

        let x = a.recv().await.unwrap();
        let y = b.recv().await.unwrap();
        assert!(Arc::ptr_eq(&x.payload, &y.payload));
    }
}
