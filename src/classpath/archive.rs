// src/classpath/archive.rs

//! `.jar` / `.zip` archives on the classpath.
//!
//! The archive is listed once per modification time. Results are cached per
//! prefix set (keyed by set id, validated by set version), so alternating
//! between two prefix sets does not rebuild either result.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use tracing::debug;
use zip::ZipArchive;

use crate::classpath::{ApplicableResources, ClassPathEntry, admit};
use crate::errors::{OracleError, Result};
use crate::fs::in_hidden_directory;
use crate::logging::ScanLogger;
use crate::resource::{PathPrefixSet, Resource};

/// One file inside an archive.
#[derive(Debug)]
pub struct ZipFileResource {
    entry_location: Arc<str>,
    path: String,
    archive: Arc<Path>,
    archive_modified: SystemTime,
}

impl Resource for ZipFileResource {
    fn path(&self) -> &str {
        &self.path
    }

    fn location(&self) -> String {
        format!("{}{}", self.entry_location, self.path)
    }

    fn entry_location(&self) -> &str {
        &self.entry_location
    }

    fn last_modified(&self) -> SystemTime {
        self.archive_modified
    }

    fn is_stale(&self) -> bool {
        archive_modified(&self.archive) != Some(self.archive_modified)
    }

    fn open_contents(&self) -> Option<Box<dyn Read + Send>> {
        let file = File::open(&self.archive).ok()?;
        let mut zip = ZipArchive::new(file).ok()?;
        let mut entry = zip.by_name(&self.path).ok()?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).ok()?;
        Some(Box::new(Cursor::new(buf)))
    }
}

#[derive(Default)]
struct ArchiveState {
    modified: Option<SystemTime>,
    listing: Option<Arc<Vec<Arc<ZipFileResource>>>>,
    // Prefix-set id -> (set version, result).
    by_set: HashMap<u64, (u64, Arc<ApplicableResources>)>,
}

/// An archive file on the classpath.
pub struct ZipFileClassPathEntry {
    archive: Arc<Path>,
    location: Arc<str>,
    state: Mutex<ArchiveState>,
}

impl ZipFileClassPathEntry {
    pub fn new(archive: impl AsRef<Path>) -> Self {
        let archive = archive.as_ref();
        let archive = fs::canonicalize(archive).unwrap_or_else(|_| archive.to_path_buf());
        let location: Arc<str> = format!("jar:file:{}!/", archive.display()).into();
        Self {
            archive: archive.into(),
            location,
            state: Mutex::new(ArchiveState::default()),
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Every file entry in the archive, hidden directories skipped.
    fn list(&self, modified: SystemTime) -> Result<Vec<Arc<ZipFileResource>>> {
        let file = File::open(&self.archive)?;
        let mut zip = ZipArchive::new(file).map_err(|source| self.archive_error(source))?;

        let mut listing = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|source| self.archive_error(source))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name();
            if in_hidden_directory(name) {
                continue;
            }
            listing.push(Arc::new(ZipFileResource {
                entry_location: Arc::clone(&self.location),
                path: name.to_string(),
                archive: Arc::clone(&self.archive),
                archive_modified: modified,
            }));
        }
        debug!(archive = ?self.archive, entries = listing.len(), "listed archive");
        Ok(listing)
    }

    fn archive_error(&self, source: zip::result::ZipError) -> OracleError {
        OracleError::Archive {
            location: self.location.to_string(),
            source,
        }
    }
}

impl ClassPathEntry for ZipFileClassPathEntry {
    fn location(&self) -> &str {
        &self.location
    }

    fn find_applicable_resources(
        &self,
        logger: &dyn ScanLogger,
        prefixes: &PathPrefixSet,
    ) -> Result<Arc<ApplicableResources>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(modified) = archive_modified(&self.archive) else {
            logger.debug(&format!(
                "Classpath archive {} does not exist; skipping",
                self.archive.display()
            ));
            *state = ArchiveState::default();
            return Ok(Arc::new(ApplicableResources::new()));
        };

        if state.modified != Some(modified) {
            *state = ArchiveState {
                modified: Some(modified),
                ..ArchiveState::default()
            };
        }

        if let Some((version, cached)) = state.by_set.get(&prefixes.id()) {
            if *version == prefixes.version() {
                return Ok(Arc::clone(cached));
            }
        }

        let listing = match state.listing.clone() {
            Some(listing) => listing,
            None => {
                let listing = Arc::new(self.list(modified)?);
                state.listing = Some(Arc::clone(&listing));
                listing
            }
        };

        let mut found = ApplicableResources::new();
        for resource in listing.iter() {
            admit(&mut found, prefixes, Arc::clone(resource) as Arc<dyn Resource>);
        }
        let found = Arc::new(found);
        state
            .by_set
            .insert(prefixes.id(), (prefixes.version(), Arc::clone(&found)));
        Ok(found)
    }
}

impl std::fmt::Debug for ZipFileClassPathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFileClassPathEntry")
            .field("location", &self.location)
            .finish()
    }
}

fn archive_modified(archive: &Path) -> Option<SystemTime> {
    fs::metadata(archive).and_then(|m| m.modified()).ok()
}
