//! Hot-reloadable profile table.
//!
//! Readers take an `Arc` snapshot that stays immutable for as long as they
//! hold it; a reload swaps in a new table and bumps the generation counter.

use crate::error::Result;
use crate::loader::load_table;
use crate::model::ProfileTable;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct ProfileStore {
    path: Option<PathBuf>,
    table: RwLock<Arc<ProfileTable>>,
    generation: AtomicU64,
}

/// Shared store handle.
pub type ProfileStoreRef = Arc<ProfileStore>;

impl ProfileStore {
    /// Store backed by a file. Load failures leave the table empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: Some(path.into()),
            table: RwLock::new(Arc::new(ProfileTable::default())),
            generation: AtomicU64::new(0),
        };
        let _ = store.reload();
        store
    }

    /// In-memory store with a fixed table; [`reload`](Self::reload) is a no-op.
    pub fn from_table(table: ProfileTable) -> Self {
        Self {
            path: None,
            table: RwLock::new(Arc::new(table)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current table.
    pub fn snapshot(&self) -> Arc<ProfileTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Incremented on every successful or failed reload.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Re-read the backing file.
    ///
    /// On failure the table becomes empty and the error is returned.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let (table, result) = match load_table(path) {
            Ok(table) => {
                tracing::info!(
                    path = %path.display(),
                    users = table.users.len(),
                    has_default = table.default.is_some(),
                    "profile table loaded"
                );
                (table, Ok(()))
            }
            Err(e) => {
                tracing::error!(error = %e, "profile table unavailable, personalization disabled");
                (ProfileTable::default(), Err(e))
            }
        };

        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
        self.generation.fetch_add(1, Ordering::AcqRel);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_is_empty() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::open(dir.path().join("user_profiles.json"));
        assert!(store.snapshot().is_empty());
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_profiles.json");
        std::fs::write(&path, r#"{"users": {"Andii": {}}}"#).unwrap();
        let store = ProfileStore::open(&path);
        let before = store.snapshot();

        std::fs::write(&path, r#"{"users": {"Andii": {}, "Zoe": {}}}"#).unwrap();
        store.reload().unwrap();

        assert_eq!(before.users.len(), 1);
        assert_eq!(store.snapshot().users.len(), 2);
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_broken_reload_empties_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_profiles.json");
        std::fs::write(&path, r#"{"users": {"Andii": {}}}"#).unwrap();
        let store = ProfileStore::open(&path);

        std::fs::write(&path, "not json").unwrap();
        assert!(store.reload().is_err());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_from_table_reload_is_noop() {
        let mut table = ProfileTable::default();
        table.users.insert("Andii".to_string(), Default::default());
        let store = ProfileStore::from_table(table);

        store.reload().unwrap();
        assert_eq!(store.snapshot().users.len(), 1);
        assert_eq!(store.generation(), 0);
    }
}
