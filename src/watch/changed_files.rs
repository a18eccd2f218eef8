// src/watch/changed_files.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexSet;
use tracing::debug;

use crate::errors::Result;
use crate::watch::watcher::{
    ChangeListener, DirectoryWatcher, FileChange, ListenerId, WatchRegistry, WatchScope,
};

#[derive(Default)]
struct PendingChanges {
    // Arrival order, no duplicates between two drains.
    paths: Mutex<IndexSet<PathBuf>>,
    active: AtomicBool,
}

impl ChangeListener for PendingChanges {
    fn on_change(&self, change: &FileChange) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(change.path.clone());
    }
}

/// Collects every path that changed below a root since the last
/// [`take_changed_files`](Self::take_changed_files).
pub struct ChangedFileAccumulator {
    root: PathBuf,
    // Released on shutdown so the watcher can stop.
    watcher: Mutex<Option<Arc<DirectoryWatcher>>>,
    pending: Arc<PendingChanges>,
    listener: ListenerId,
    shut_down: AtomicBool,
}

impl ChangedFileAccumulator {
    /// Start accumulating changes below `root` with a watcher of its own.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_registry(&WatchRegistry::new(), root)
    }

    /// Start accumulating, sharing the watcher for `root` with other users
    /// of `registry`.
    pub fn with_registry(registry: &WatchRegistry, root: impl AsRef<Path>) -> Result<Self> {
        let watcher = registry.watcher_for(root.as_ref(), WatchScope::All)?;
        let pending = Arc::new(PendingChanges {
            active: AtomicBool::new(true),
            ..PendingChanges::default()
        });
        let listener = watcher.subscribe(Arc::clone(&pending) as Arc<dyn ChangeListener>);
        debug!(root = ?watcher.root(), "changed-file accumulator started");
        Ok(Self {
            root: watcher.root().to_path_buf(),
            watcher: Mutex::new(Some(watcher)),
            pending,
            listener,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Canonical root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drain the changed paths, in the order they first changed.
    pub fn take_changed_files(&self) -> Vec<PathBuf> {
        let mut paths = self
            .pending
            .paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *paths).into_iter().collect()
    }

    /// Stop accumulating and release the watcher. Idempotent; later drains
    /// return nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pending.active.store(false, Ordering::Release);
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.unsubscribe(self.listener);
        }
        self.pending
            .paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!(root = ?self.root, "changed-file accumulator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for ChangedFileAccumulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ChangedFileAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangedFileAccumulator")
            .field("root", &self.root)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
