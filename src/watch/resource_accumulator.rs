// src/watch/resource_accumulator.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::classpath::{ApplicableResource, ApplicableResources, DirectoryResource};
use crate::errors::{OracleError, Result};
use crate::fs::{FileStamp, FileSystem, RealFileSystem, in_hidden_directory, is_hidden_name};
use crate::resource::{PathPrefixSet, Resource};
use crate::watch::path_utils::relative_str;
use crate::watch::watcher::{
    ChangeKind, ChangeListener, DirectoryWatcher, FileChange, ListenerId, WatchRegistry,
    WatchScope,
};

struct LiveState {
    prefixes: PathPrefixSet,
    source_id: u64,
    source_version: u64,
    resources: ApplicableResources,
    // Cleared on every mutation, rebuilt on demand.
    published: Option<Arc<ApplicableResources>>,
}

struct LiveResources {
    root: PathBuf,
    entry_location: String,
    fs: Arc<dyn FileSystem>,
    state: Mutex<LiveState>,
    active: AtomicBool,
}

/// Keeps the visible resources below one root current by listening to
/// filesystem changes instead of rescanning.
///
/// A full walk happens at construction and whenever the prefix set changes;
/// after that, each change only touches the affected paths. A resource
/// whose file kept its modification time and size keeps its object, and [`resources`](Self::resources)
/// returns the same `Arc` until something actually changes.
pub struct ResourceAccumulator {
    // Released on shutdown so the watcher can stop.
    watcher: Mutex<Option<Arc<DirectoryWatcher>>>,
    listener: ListenerId,
    live: Arc<LiveResources>,
    shut_down: AtomicBool,
}

impl ResourceAccumulator {
    /// Walk `root` and start following changes below it.
    ///
    /// Fails with [`OracleError::FilesystemCycle`] if a symlink below `root`
    /// leads back to one of its own ancestors.
    pub fn new(
        registry: &WatchRegistry,
        root: &Path,
        entry_location: &str,
        prefixes: &PathPrefixSet,
    ) -> Result<Self> {
        let watcher = registry.watcher_for(root, WatchScope::Visible)?;
        let live = Arc::new(LiveResources {
            root: watcher.root().to_path_buf(),
            entry_location: entry_location.to_string(),
            fs: Arc::new(RealFileSystem),
            state: Mutex::new(LiveState {
                prefixes: prefixes.clone(),
                source_id: prefixes.id(),
                source_version: prefixes.version(),
                resources: ApplicableResources::new(),
                published: None,
            }),
            active: AtomicBool::new(true),
        });

        // Subscribe before walking so nothing slips between the two.
        let listener = watcher.subscribe(Arc::clone(&live) as Arc<dyn ChangeListener>);
        if let Err(err) = live.rescan() {
            live.active.store(false, Ordering::Release);
            watcher.unsubscribe(listener);
            return Err(err);
        }

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            listener,
            live,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.live.root
    }

    /// Current visible resources, keyed by resource path.
    pub fn resources(&self) -> Arc<ApplicableResources> {
        let mut state = self.live.state();
        if let Some(published) = &state.published {
            return Arc::clone(published);
        }
        let published = Arc::new(state.resources.clone());
        state.published = Some(Arc::clone(&published));
        published
    }

    /// Id of the prefix set this accumulator follows.
    pub fn source_id(&self) -> u64 {
        self.live.state().source_id
    }

    /// Version of that set at the last rescan.
    pub fn source_version(&self) -> u64 {
        self.live.state().source_version
    }

    /// Adopt a new prefix set and rescan.
    pub fn set_path_prefixes(&self, prefixes: &PathPrefixSet) -> Result<()> {
        {
            let mut state = self.live.state();
            state.prefixes = prefixes.clone();
            state.source_id = prefixes.id();
            state.source_version = prefixes.version();
        }
        self.live.rescan()
    }

    /// Walk the whole tree again.
    pub fn rescan(&self) -> Result<()> {
        self.live.rescan()
    }

    /// Stop following changes and release the watcher. Idempotent; the last
    /// snapshot stays readable.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.live.active.store(false, Ordering::Release);
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.unsubscribe(self.listener);
        }
        debug!(root = ?self.live.root, "resource accumulator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for ResourceAccumulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ResourceAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAccumulator")
            .field("root", &self.live.root)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl LiveResources {
    fn state(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rescan(&self) -> Result<()> {
        let mut state = self.state();
        let mut found = ApplicableResources::new();
        self.walk(&self.root, &state.prefixes, &state.resources, &mut found)?;

        if !same_resources(&state.resources, &found) {
            state.resources = found;
            state.published = None;
        }
        debug!(
            root = ?self.root,
            resources = state.resources.len(),
            "resource accumulator rescanned"
        );
        Ok(())
    }

    /// Walk `start` (at or below the root) following symlinks, recording
    /// every visible file in `found`. Unchanged files keep the object they
    /// have in `previous`.
    fn walk(
        &self,
        start: &Path,
        prefixes: &PathPrefixSet,
        previous: &ApplicableResources,
        found: &mut ApplicableResources,
    ) -> Result<()> {
        let walker = WalkDir::new(start)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                if e.file_name().to_str().is_none_or(is_hidden_name) {
                    return false;
                }
                match relative_str(&self.root, e.path()) {
                    Some(rel) => prefixes.includes_directory(&rel),
                    None => false,
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if let Some(ancestor) = err.loop_ancestor() {
                        return Err(OracleError::FilesystemCycle {
                            path: err.path().map(Path::to_path_buf).unwrap_or_default(),
                            ancestor: ancestor.to_path_buf(),
                        });
                    }
                    warn!(%err, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_str(&self.root, entry.path()) else {
                continue;
            };
            let Some(stamp) = entry
                .metadata()
                .ok()
                .and_then(|m| FileStamp::from_metadata(&m).ok())
            else {
                continue;
            };
            if let Some(visible) = self.resolve(&rel, entry.path(), stamp, prefixes, previous) {
                found.insert(rel, visible);
            }
        }
        Ok(())
    }

    fn resolve(
        &self,
        rel: &str,
        file: &Path,
        stamp: FileStamp,
        prefixes: &PathPrefixSet,
        previous: &ApplicableResources,
    ) -> Option<ApplicableResource> {
        let resolution = prefixes.includes_resource(rel)?;
        if let Some(existing) = previous.get(rel) {
            // Staleness compares modification time and size.
            if existing.resolution == resolution && !existing.resource.is_stale() {
                return Some(existing.clone());
            }
        }
        let resource: Arc<dyn Resource> = Arc::new(DirectoryResource::new(
            self.entry_location.clone(),
            rel,
            file,
            stamp,
            Arc::clone(&self.fs),
        ));
        Some(ApplicableResource {
            resource,
            resolution,
        })
    }

    fn apply(&self, change: &FileChange) {
        let Some(rel) = relative_str(&self.root, &change.path) else {
            return;
        };
        if rel.is_empty() || in_hidden_directory(&rel) {
            return;
        }

        let mut state = self.state();
        let state = &mut *state;
        let changed = match change.kind {
            ChangeKind::Removed => {
                let dir_prefix = format!("{rel}/");
                let before = state.resources.len();
                state
                    .resources
                    .retain(|path, _| path != &rel && !path.starts_with(&dir_prefix));
                before != state.resources.len()
            }
            ChangeKind::Created | ChangeKind::Modified => {
                if change.path.is_dir() {
                    let Some(name) = change.path.file_name().and_then(|n| n.to_str()) else {
                        return;
                    };
                    if is_hidden_name(name) {
                        return;
                    }
                    let mut found = ApplicableResources::new();
                    if let Err(err) =
                        self.walk(&change.path, &state.prefixes, &state.resources, &mut found)
                    {
                        warn!(%err, dir = ?change.path, "not following new directory");
                        return;
                    }
                    let mut changed = false;
                    for (path, visible) in found {
                        changed |= upsert(&mut state.resources, path, visible);
                    }
                    changed
                } else if change.path.is_file() {
                    let Some(stamp) = std::fs::metadata(&change.path)
                        .and_then(|m| FileStamp::from_metadata(&m))
                        .ok()
                    else {
                        return;
                    };
                    match self.resolve(&rel, &change.path, stamp, &state.prefixes, &state.resources)
                    {
                        Some(visible) => upsert(&mut state.resources, rel, visible),
                        None => false,
                    }
                } else {
                    false
                }
            }
        };

        if changed {
            state.published = None;
            debug!(path = ?change.path, kind = ?change.kind, "live resources updated");
        }
    }
}

impl ChangeListener for LiveResources {
    fn on_change(&self, change: &FileChange) {
        if self.active.load(Ordering::Acquire) {
            self.apply(change);
        }
    }
}

/// Insert unless the very same resource is already there. Returns true if
/// the map changed.
fn upsert(resources: &mut ApplicableResources, path: String, visible: ApplicableResource) -> bool {
    if let Some(existing) = resources.get(&path) {
        if Arc::ptr_eq(&existing.resource, &visible.resource) {
            return false;
        }
    }
    resources.insert(path, visible);
    true
}

fn same_resources(a: &ApplicableResources, b: &ApplicableResources) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|((pa, ra), (pb, rb))| {
            pa == pb
                && Arc::ptr_eq(&ra.resource, &rb.resource)
                && ra.resolution == rb.resolution
        })
}
