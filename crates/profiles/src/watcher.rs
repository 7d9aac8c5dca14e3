//! File watcher for profile hot reloading.
//!
//! Watches the profile table's parent directory (editors often replace the
//! file rather than write in place) and reloads the store on change.

use crate::error::{ProfileError, Result};
use crate::store::ProfileStoreRef;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Reloads a [`ProfileStore`](crate::ProfileStore) whenever its file changes.
pub struct ProfileWatcher {
    /// The watcher instance (kept alive).
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ProfileWatcher {
    pub fn new(store: ProfileStoreRef) -> Result<Self> {
        let path = store
            .path()
            .map(Path::to_path_buf)
            .ok_or_else(|| ProfileError::WatcherCreation("store has no backing file".to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| ProfileError::WatchPath {
                path: path.clone(),
                message: "not a file path".to_string(),
            })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| {
                if let Err(e) = tx.send(result) {
                    error!(error = %e, "Failed to send watcher event");
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| ProfileError::WatcherCreation(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ProfileError::WatchPath {
                path: dir.clone(),
                message: e.to_string(),
            })?;
        info!(path = %path.display(), "Watching profile table");

        thread::spawn(move || event_loop(rx, file_name, store));

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ProfileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileWatcher")
            .field("path", &self.path)
            .finish()
    }
}

fn touches_table(event: &Event, file_name: &OsStr) -> bool {
    event.paths.iter().any(|p| p.file_name() == Some(file_name))
}

fn event_loop(
    rx: mpsc::Receiver<std::result::Result<Event, notify::Error>>,
    file_name: OsString,
    store: ProfileStoreRef,
) {
    loop {
        match rx.recv() {
            Ok(Ok(event)) if touches_table(&event, &file_name) => {
                debug!(paths = ?event.paths, "Profile table changed, waiting for writes to settle");
            }
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => {
                warn!(error = %e, "File watcher error");
                continue;
            }
            Err(e) => {
                // Channel closed, watcher was dropped
                debug!(error = %e, "Watcher channel closed");
                return;
            }
        }

        // Trailing edge: a save may truncate first and write later.
        let mut coalesced = 0usize;
        loop {
            match rx.recv_timeout(DEBOUNCE) {
                Ok(Ok(event)) => {
                    if touches_table(&event, &file_name) {
                        coalesced += 1;
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "File watcher error"),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Watcher channel closed");
                    return;
                }
            }
        }

        info!(coalesced, "Reloading profile table");
        // Failures are logged by the store and leave an empty table.
        let _ = store.reload();
    }
}
