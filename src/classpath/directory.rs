// src/classpath/directory.rs

//! Directory trees on the classpath.
//!
//! A [`DirectoryClassPathEntry`] works in one of two modes:
//!
//! - **scanning** (default): every call walks the tree through the
//!   [`FileSystem`] collaborator, pruning directories no prefix can reach.
//!   Files whose modification time and size did not change keep their resource
//!   object from the previous walk.
//! - **watched**: the first call for a given prefix set starts a
//!   [`ResourceAccumulator`] that keeps the result up to date from
//!   filesystem events; later calls return its current snapshot. Only the
//!   most recently used prefix set keeps an accumulator.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::{Level, debug};

use crate::classpath::{ApplicableResources, ClassPathEntry, admit};
use crate::errors::{OracleError, Result};
use crate::fs::{FileStamp, FileSystem, RealFileSystem, file_name_str, is_hidden_name};
use crate::logging::ScanLogger;
use crate::resource::{PathPrefixSet, Resource};
use crate::watch::{PrefixChangeManager, PrefixRegistration, ResourceAccumulator, WatchRegistry};

/// A file inside a directory entry.
#[derive(Debug)]
pub struct DirectoryResource {
    entry_location: String,
    path: String,
    file: PathBuf,
    stamp: FileStamp,
    fs: Arc<dyn FileSystem>,
}

impl DirectoryResource {
    pub(crate) fn new(
        entry_location: impl Into<String>,
        path: impl Into<String>,
        file: impl Into<PathBuf>,
        stamp: FileStamp,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            entry_location: entry_location.into(),
            path: path.into(),
            file: file.into(),
            stamp,
            fs,
        }
    }

    /// The file on disk backing this resource.
    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl Resource for DirectoryResource {
    fn path(&self) -> &str {
        &self.path
    }

    fn location(&self) -> String {
        format!("file:{}", self.file.display())
    }

    fn entry_location(&self) -> &str {
        &self.entry_location
    }

    fn last_modified(&self) -> SystemTime {
        self.stamp.modified
    }

    fn is_stale(&self) -> bool {
        match self.fs.stamp(&self.file) {
            Ok(stamp) => stamp != self.stamp,
            Err(_) => true,
        }
    }

    fn open_contents(&self) -> Option<Box<dyn Read + Send>> {
        self.fs.open_read(&self.file).ok()
    }
}

struct WatchedSet {
    accumulator: Arc<ResourceAccumulator>,
    _registration: PrefixRegistration,
}

struct LiveMode {
    registry: WatchRegistry,
    manager: Arc<PrefixChangeManager>,
    // Keyed by prefix-set id. Holds at most one set.
    sets: Mutex<HashMap<u64, WatchedSet>>,
}

/// A directory tree on the classpath.
pub struct DirectoryClassPathEntry {
    dir: PathBuf,
    location: String,
    fs: Arc<dyn FileSystem>,
    // Keyed by resource path; reused while the file stamp is unchanged.
    known: Mutex<HashMap<String, Arc<DirectoryResource>>>,
    live: Option<LiveMode>,
}

impl DirectoryClassPathEntry {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_fs(dir, Arc::new(RealFileSystem))
    }

    pub fn with_fs(dir: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Self {
        let dir = dir.as_ref();
        let dir = fs.canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let location = directory_location(&dir);
        Self {
            dir,
            location,
            fs,
            known: Mutex::new(HashMap::new()),
            live: None,
        }
    }

    /// A directory entry kept current by filesystem watching. Watching
    /// always uses the real filesystem.
    pub fn watched(
        dir: impl AsRef<Path>,
        registry: &WatchRegistry,
        manager: &Arc<PrefixChangeManager>,
    ) -> Self {
        let mut entry = Self::new(dir);
        entry.live = Some(LiveMode {
            registry: registry.clone(),
            manager: Arc::clone(manager),
            sets: Mutex::new(HashMap::new()),
        });
        entry
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_watched(&self) -> bool {
        self.live.is_some()
    }

    fn known(&self) -> MutexGuard<'_, HashMap<String, Arc<DirectoryResource>>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scan(&self, logger: &dyn ScanLogger, prefixes: &PathPrefixSet) -> Result<ApplicableResources> {
        let mut found = ApplicableResources::new();
        if !self.fs.is_dir(&self.dir) {
            logger.debug(&format!(
                "Classpath directory {} does not exist; skipping",
                self.dir.display()
            ));
            return Ok(found);
        }

        let mut known = self.known();
        let mut ancestors = vec![self.dir.clone()];
        let mut walk = Walk {
            entry: self,
            logger,
            prefixes,
            known: &mut *known,
            found: &mut found,
        };
        walk.descend(&self.dir, "", &mut ancestors)?;

        known.retain(|path, _| found.contains_key(path));
        debug!(dir = ?self.dir, resources = found.len(), "scanned classpath directory");
        Ok(found)
    }

    fn live_resources(
        &self,
        live: &LiveMode,
        prefixes: &PathPrefixSet,
    ) -> Result<Arc<ApplicableResources>> {
        let mut sets = live.sets.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = sets
            .get(&prefixes.id())
            .map(|watched| Arc::clone(&watched.accumulator));
        if let Some(accumulator) = existing {
            drop(sets);
            if accumulator.source_version() != prefixes.version() {
                live.manager.path_prefixes_changed(prefixes)?;
            }
            return Ok(accumulator.resources());
        }

        if !self.dir.is_dir() {
            return Ok(Arc::new(ApplicableResources::new()));
        }

        let accumulator = Arc::new(ResourceAccumulator::new(
            &live.registry,
            &self.dir,
            &self.location,
            prefixes,
        )?);
        let registration = live.manager.register(Arc::clone(&accumulator));
        let resources = accumulator.resources();
        let replaced: Vec<WatchedSet> = sets.drain().map(|(_, set)| set).collect();
        sets.insert(
            prefixes.id(),
            WatchedSet {
                accumulator,
                _registration: registration,
            },
        );
        drop(sets);
        if !replaced.is_empty() {
            debug!(
                dir = ?self.dir,
                count = replaced.len(),
                "released accumulators of earlier prefix sets"
            );
        }
        // Dropping a registration unregisters and shuts its accumulator down.
        drop(replaced);
        Ok(resources)
    }
}

struct Walk<'a> {
    entry: &'a DirectoryClassPathEntry,
    logger: &'a dyn ScanLogger,
    prefixes: &'a PathPrefixSet,
    known: &'a mut HashMap<String, Arc<DirectoryResource>>,
    found: &'a mut ApplicableResources,
}

impl Walk<'_> {
    fn descend(&mut self, dir: &Path, rel_dir: &str, ancestors: &mut Vec<PathBuf>) -> Result<()> {
        let entry = self.entry;
        let fs = &entry.fs;
        let children = match fs.read_dir(dir) {
            Ok(children) => children,
            Err(err) => {
                let cause: &(dyn StdError + 'static) = err.as_ref();
                self.logger.log(
                    Level::WARN,
                    &format!("Unable to list directory {}", dir.display()),
                    Some(cause),
                );
                return Ok(());
            }
        };

        for child in children {
            let Some(name) = file_name_str(&child) else {
                continue;
            };

            if fs.is_dir(&child) {
                if is_hidden_name(name) {
                    continue;
                }
                let child_rel = format!("{rel_dir}{name}/");
                if !self.prefixes.includes_directory(&child_rel) {
                    continue;
                }
                let canonical = fs.canonicalize(&child).unwrap_or_else(|_| child.clone());
                if let Some(ancestor) = ancestors.iter().find(|a| **a == canonical) {
                    return Err(OracleError::FilesystemCycle {
                        path: child,
                        ancestor: ancestor.clone(),
                    });
                }
                ancestors.push(canonical);
                self.descend(&child, &child_rel, ancestors)?;
                ancestors.pop();
            } else if fs.is_file(&child) {
                let rel = format!("{rel_dir}{name}");
                if self.prefixes.includes_resource(&rel).is_none() {
                    continue;
                }
                if let Some(resource) = self.resource_for(&child, rel) {
                    admit(self.found, self.prefixes, resource);
                }
            }
        }
        Ok(())
    }

    fn resource_for(&mut self, file: &Path, rel: String) -> Option<Arc<dyn Resource>> {
        let stamp = match self.entry.fs.stamp(file) {
            Ok(stamp) => stamp,
            Err(err) => {
                let cause: &(dyn StdError + 'static) = err.as_ref();
                self.logger.log(
                    Level::WARN,
                    &format!("Unable to read {}", file.display()),
                    Some(cause),
                );
                return None;
            }
        };

        if let Some(existing) = self.known.get(&rel) {
            if existing.stamp == stamp && existing.file == file {
                let existing: Arc<dyn Resource> = existing.clone();
                return Some(existing);
            }
        }

        let resource = Arc::new(DirectoryResource::new(
            self.entry.location.clone(),
            rel.clone(),
            file,
            stamp,
            Arc::clone(&self.entry.fs),
        ));
        self.known.insert(rel, Arc::clone(&resource));
        Some(resource)
    }
}

impl ClassPathEntry for DirectoryClassPathEntry {
    fn location(&self) -> &str {
        &self.location
    }

    fn find_applicable_resources(
        &self,
        logger: &dyn ScanLogger,
        prefixes: &PathPrefixSet,
    ) -> Result<Arc<ApplicableResources>> {
        match &self.live {
            Some(live) => self.live_resources(live, prefixes),
            None => Ok(Arc::new(self.scan(logger, prefixes)?)),
        }
    }
}

impl std::fmt::Debug for DirectoryClassPathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClassPathEntry")
            .field("location", &self.location)
            .field("watched", &self.live.is_some())
            .finish()
    }
}

/// `file:` location of a directory, always ending in `/`.
pub(crate) fn directory_location(dir: &Path) -> String {
    let mut location = format!("file:{}", dir.display());
    if !location.ends_with('/') {
        location.push('/');
    }
    location
}
