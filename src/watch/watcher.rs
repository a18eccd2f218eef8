// src/watch/watcher.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::is_hidden_name;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single change below a watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Receives changes from a [`DirectoryWatcher`], on the watcher's dispatch
/// thread. Implementations should return quickly.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, change: &FileChange);
}

/// Which directories below the root get a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WatchScope {
    /// Every directory.
    #[default]
    All,
    /// Everything except directories whose name starts with `.`, such as
    /// `.git` or `.svn`.
    Visible,
}

/// Handle returned by [`DirectoryWatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct WatchShared {
    root: PathBuf,
    scope: WatchScope,
    native: Mutex<Option<RecommendedWatcher>>,
    // Canonical directory -> every path below the root that reaches it.
    watched: Mutex<HashMap<PathBuf, Vec<PathBuf>>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ChangeListener>)>>,
    next_listener: AtomicU64,
    shut_down: AtomicBool,
}

/// Watches every directory below a root, one non-recursive registration
/// per directory.
///
/// Each canonical directory gets one native registration, however many
/// paths below the root lead to it. A change inside it is reported once per
/// such path. A symlink leading back to one of its own ancestors is not
/// followed. New directories are registered before their events are
/// dispatched, and the files already inside them are reported as created.
///
/// Events flow from the notify callback through an unbounded channel to a
/// dedicated dispatch thread. Dropping the watcher (or calling
/// [`shutdown`](Self::shutdown)) releases the native watcher, which closes
/// the channel and ends the thread.
pub struct DirectoryWatcher {
    shared: Arc<WatchShared>,
}

impl DirectoryWatcher {
    /// Start watching every directory below `root`, which must exist.
    pub fn start(root: &Path) -> Result<Arc<Self>> {
        Self::start_with_scope(root, WatchScope::All)
    }

    pub fn start_with_scope(root: &Path, scope: WatchScope) -> Result<Arc<Self>> {
        let root = root.canonicalize()?;

        // Channel from the blocking notify callback into the dispatch thread.
        let (event_tx, mut event_rx) =
            tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();

        let native = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away after shutdown.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;

        let shared = Arc::new(WatchShared {
            root: root.clone(),
            scope,
            native: Mutex::new(Some(native)),
            watched: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        });

        let mut ignored = Vec::new();
        shared.register_tree(&root, &mut Vec::new(), false, &mut ignored);

        let dispatch = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("classpath-watch".to_string())
            .spawn(move || {
                while let Some(res) = event_rx.blocking_recv() {
                    match res {
                        Ok(event) => dispatch.handle_event(event),
                        Err(err) => warn!(%err, "file watch error"),
                    }
                }
                debug!(root = ?dispatch.root, "watch dispatch loop finished");
            })?;

        info!(
            root = ?root,
            ?scope,
            directories = lock(&shared.watched).len(),
            "directory watcher started"
        );
        Ok(Arc::new(Self { shared }))
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn scope(&self) -> WatchScope {
        self.shared.scope
    }

    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        lock(&self.shared.listeners).retain(|(existing, _)| *existing != id);
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }

    /// True if `dir` (resolved through symlinks) has a registration.
    pub fn is_watching(&self, dir: &Path) -> bool {
        match dir.canonicalize() {
            Ok(canonical) => lock(&self.shared.watched).contains_key(&canonical),
            Err(_) => false,
        }
    }

    /// Paths below the root through which `dir` is being watched.
    pub fn watched_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let Ok(canonical) = dir.canonicalize() else {
            return Vec::new();
        };
        lock(&self.shared.watched)
            .get(&canonical)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of native registrations.
    pub fn watched_directory_count(&self) -> usize {
        lock(&self.shared.watched).len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::Acquire)
    }

    /// Stop watching. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("root", &self.shared.root)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl WatchShared {
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the native watcher drops the channel sender.
        let native = lock(&self.native).take();
        drop(native);
        lock(&self.watched).clear();
        lock(&self.listeners).clear();
        debug!(root = ?self.root, "directory watcher shut down");
    }

    /// Register `dir` and everything below it. `ancestors` holds the
    /// canonical directories on the way down from the root. With
    /// `synthesize`, every file and directory found is reported as created.
    fn register_tree(
        &self,
        dir: &Path,
        ancestors: &mut Vec<PathBuf>,
        synthesize: bool,
        out: &mut Vec<FileChange>,
    ) {
        if self.scope == WatchScope::Visible
            && dir != self.root
            && dir.file_name().and_then(|n| n.to_str()).is_none_or(is_hidden_name)
        {
            return;
        }
        let canonical = match dir.canonicalize() {
            Ok(c) => c,
            Err(err) => {
                warn!(?dir, %err, "cannot resolve directory; not watching it");
                return;
            }
        };
        if ancestors.contains(&canonical) {
            debug!(?dir, ?canonical, "symlink leads back to an ancestor; not following");
            return;
        }

        {
            let mut watched = lock(&self.watched);
            match watched.get_mut(&canonical) {
                Some(paths) if paths.iter().any(|p| p == dir) => return,
                Some(paths) => {
                    debug!(?dir, ?canonical, "directory already watched; adding path");
                    paths.push(dir.to_path_buf());
                }
                None => {
                    let mut native = lock(&self.native);
                    let Some(native) = native.as_mut() else {
                        return;
                    };
                    if let Err(err) = native.watch(&canonical, RecursiveMode::NonRecursive) {
                        warn!(?dir, %err, "failed to watch directory; skipping");
                        return;
                    }
                    watched.insert(canonical.clone(), vec![dir.to_path_buf()]);
                }
            }
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(?dir, %err, "cannot list watched directory");
                return;
            }
        };
        ancestors.push(canonical);
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if synthesize {
                    out.push(FileChange::new(&path, ChangeKind::Created));
                }
                self.register_tree(&path, ancestors, synthesize, out);
            } else if synthesize {
                out.push(FileChange::new(path, ChangeKind::Created));
            }
        }
        ancestors.pop();
    }

    /// Canonical directories from the root down to the parent of `dir`.
    fn ancestors_of(&self, dir: &Path) -> Vec<PathBuf> {
        dir.ancestors()
            .skip(1)
            .take_while(|p| p.starts_with(&self.root))
            .filter_map(|p| p.canonicalize().ok())
            .collect()
    }

    /// Every path below the root that names `path`: one per path through
    /// which its parent directory is watched.
    fn paths_for(&self, path: &Path) -> Vec<PathBuf> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return vec![path.to_path_buf()];
        };
        match lock(&self.watched).get(parent) {
            Some(paths) => paths.iter().map(|p| p.join(name)).collect(),
            None => vec![path.to_path_buf()],
        }
    }

    /// Drop registrations for a removed path. `gone` is the removed path as
    /// notify reported it, `paths` every path below the root that named it.
    /// Returns the other paths that led into the removed directories, which
    /// have disappeared as well.
    fn forget_tree(&self, gone: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
        let under = |p: &PathBuf| paths.iter().any(|removed| p.starts_with(removed));
        let mut unwatch = Vec::new();
        let mut orphaned = Vec::new();
        {
            let mut watched = lock(&self.watched);
            let dead: Vec<PathBuf> = watched
                .keys()
                .filter(|canonical| canonical.starts_with(gone))
                .cloned()
                .collect();
            for canonical in dead {
                if let Some(reached_by) = watched.remove(&canonical) {
                    orphaned.extend(reached_by.into_iter().filter(|p| !under(p)));
                    unwatch.push(canonical);
                }
            }
            // Paths through a removed symlink no longer lead anywhere.
            watched.retain(|canonical, reached_by| {
                reached_by.retain(|p| !under(p));
                if reached_by.is_empty() {
                    unwatch.push(canonical.clone());
                    false
                } else {
                    true
                }
            });
        }
        if unwatch.is_empty() {
            return orphaned;
        }
        if let Some(native) = lock(&self.native).as_mut() {
            for canonical in &unwatch {
                // The OS usually dropped the watch already.
                let _ = native.unwatch(canonical);
            }
        }
        debug!(?gone, count = unwatch.len(), "stopped watching removed directories");
        orphaned
    }

    fn handle_event(&self, event: Event) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        debug!(?event, "received notify event");

        let mut changes = Vec::new();
        let mut orphaned = Vec::new();
        for change in translate(&event) {
            let paths = self.paths_for(&change.path);
            if change.kind == ChangeKind::Removed {
                orphaned.extend(self.forget_tree(&change.path, &paths));
            }
            changes.extend(paths.into_iter().map(|p| FileChange::new(p, change.kind)));
        }
        for path in orphaned {
            if !changes.iter().any(|c| c.path == path) {
                changes.push(FileChange::new(path, ChangeKind::Removed));
            }
        }

        let mut discovered = Vec::new();
        for change in &changes {
            if change.kind == ChangeKind::Created && change.path.is_dir() {
                let mut ancestors = self.ancestors_of(&change.path);
                self.register_tree(&change.path, &mut ancestors, true, &mut discovered);
            }
        }
        changes.extend(discovered);
        if changes.is_empty() {
            return;
        }

        let listeners: Vec<Arc<dyn ChangeListener>> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for change in &changes {
            for listener in &listeners {
                listener.on_change(change);
            }
        }
    }
}

/// Map a notify event onto zero or more changes, in order.
fn translate(event: &Event) -> Vec<FileChange> {
    let each = |kind: ChangeKind| -> Vec<FileChange> {
        event
            .paths
            .iter()
            .map(|p| FileChange::new(p, kind))
            .collect()
    };

    match event.kind {
        EventKind::Create(_) => each(ChangeKind::Created),
        EventKind::Remove(_) => each(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push(FileChange::new(from, ChangeKind::Removed));
            }
            if let Some(to) = event.paths.get(1) {
                out.push(FileChange::new(to, ChangeKind::Created));
            }
            out
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Removed
                };
                FileChange::new(p, kind)
            })
            .collect(),
        EventKind::Modify(_) => each(ChangeKind::Modified),
        _ => Vec::new(),
    }
}

/// Hands out one [`DirectoryWatcher`] per root and scope, shared by everyone
/// watching that root. Watchers are held weakly: the last user dropping its
/// handle stops the watcher.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    watchers: Arc<Mutex<HashMap<(PathBuf, WatchScope), Weak<DirectoryWatcher>>>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watcher_for(&self, root: &Path, scope: WatchScope) -> Result<Arc<DirectoryWatcher>> {
        let key = (root.canonicalize()?, scope);
        let mut watchers = lock(&self.watchers);
        if let Some(existing) = watchers.get(&key).and_then(Weak::upgrade) {
            if !existing.is_shut_down() {
                return Ok(existing);
            }
        }
        let watcher = DirectoryWatcher::start_with_scope(&key.0, scope)?;
        watchers.retain(|_, w| w.strong_count() > 0);
        watchers.insert(key, Arc::downgrade(&watcher));
        Ok(watcher)
    }

    /// Number of live watchers.
    pub fn active_roots(&self) -> usize {
        lock(&self.watchers)
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("active_roots", &self.active_roots())
            .finish()
    }
}
