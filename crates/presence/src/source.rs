//! Status sources.
//!
//! A source reads the shared status record. Sources report failures as
//! [`SourceError`]; turning those into the "nobody present" snapshot is the
//! poller's job, so a source stays a thin I/O adapter.

use crate::snapshot::{parse_record, StatusRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Where the detector writes its status by default.
pub const DEFAULT_STATUS_FILE: &str = "/tmp/magicmirror_face_status.json";

/// Why the status record could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("status record not found")]
    Missing,

    #[error("failed to read status record: {0}")]
    Io(String),

    #[error("malformed status record: {0}")]
    Malformed(String),

    #[error("status endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Reader for the shared status record.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Read the current record.
    async fn fetch(&self) -> Result<StatusRecord, SourceError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Shared source reference handed to every poller.
pub type SharedSource = Arc<dyn StatusSource>;

/// Status record stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStatusSource {
    path: PathBuf,
}

impl FileStatusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileStatusSource {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_FILE)
    }
}

#[async_trait]
impl StatusSource for FileStatusSource {
    async fn fetch(&self) -> Result<StatusRecord, SourceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::Missing);
            }
            Err(e) => return Err(SourceError::Io(e.to_string())),
        };
        parse_record(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Status record served by the detector's HTTP API (`GET {endpoint}/status`).
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            url: format!("{}/status", endpoint.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<StatusRecord, SourceError> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::Missing);
        }
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(resp.status().to_string()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        parse_record(&bytes)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Serves one read to every caller within `ttl`.
///
/// Several subscribers polling in the same tick then cost one I/O. Concurrent
/// callers queue on the cache lock so only the first one reaches the inner source.
pub struct MemoizedSource<S> {
    inner: S,
    ttl: Duration,
    cache: tokio::sync::Mutex<Option<(Instant, Result<StatusRecord, SourceError>)>>,
}

impl<S: StatusSource> MemoizedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: StatusSource> StatusSource for MemoizedSource<S> {
    async fn fetch(&self) -> Result<StatusRecord, SourceError> {
        let mut cache = self.cache.lock().await;
        if let Some((read_at, result)) = cache.as_ref() {
            if read_at.elapsed() < self.ttl {
                return result.clone();
            }
        }

        let result = self.inner.fetch().await;
        *cache = Some((Instant::now(), result.clone()));
        result
    }

    fn describe(&self) -> String {
        format!("{} (memoized {:?})", self.inner.describe(), self.ttl)
    }
}

/// Source that never has a record.
pub struct NullSource;

#[async_trait]
impl StatusSource for NullSource {
    async fn fetch(&self) -> Result<StatusRecord, SourceError> {
        Err(SourceError::Missing)
    }

    fn describe(&self) -> String {
        "null".to_string()
    }
}

/// In-memory source whose record is set by hand.
///
/// Counts reads so tests can check memoization.
pub struct MemorySource {
    current: Mutex<Result<StatusRecord, SourceError>>,
    reads: std::sync::atomic::AtomicUsize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            current: Mutex::new(Err(SourceError::Missing)),
            reads: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: StatusRecord) -> Self {
        let source = Self::default();
        source.set(record);
        source
    }

    pub fn set(&self, record: StatusRecord) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Ok(record);
    }

    pub fn fail(&self, error: SourceError) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Err(error);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for MemorySource {
    async fn fetch(&self) -> Result<StatusRecord, SourceError> {
        self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let source = FileStatusSource::new(dir.path().join("absent.json"));
        assert_eq!(source.fetch().await, Err(SourceError::Missing));
    }

    #[tokio::test]
    async fn test_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, r#"{"distance": 12.5, "person": "Zoe", "active": true}"#).unwrap();

        let record = FileStatusSource::new(&path).fetch().await.unwrap();
        assert_eq!(record.distance, Some(12.5));
        assert_eq!(record.person.as_deref(), Some("Zoe"));
    }

    #[tokio::test]
    async fn test_partial_file_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, r#"{"distance": 1"#).unwrap();

        let err = FileStatusSource::new(&path).fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_http_url_joins_status_path() {
        assert_eq!(
            HttpStatusSource::new("http://localhost:5000/").url(),
            "http://localhost:5000/status"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_memoized_source_shares_reads_within_ttl() {
        let source = MemoizedSource::new(MemorySource::new(), Duration::from_millis(200));
        source.inner().set(StatusRecord {
            distance: Some(10.0),
            ..Default::default()
        });

        source.fetch().await.unwrap();
        source.fetch().await.unwrap();
        assert_eq!(source.inner().reads(), 1);

        tokio::time::advance(Duration::from_millis(250)).await;
        source.fetch().await.unwrap();
        assert_eq!(source.inner().reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memoized_source_caches_errors_too() {
        let source = MemoizedSource::new(NullSource, Duration::from_millis(200));
        assert_eq!(source.fetch().await, Err(SourceError::Missing));
        assert_eq!(source.fetch().await, Err(SourceError::Missing));
    }
}
