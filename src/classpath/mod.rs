// src/classpath/mod.rs

//! Classpath entries: the places resources come from.
//!
//! Every entry answers one question: given a [`PathPrefixSet`], which of my
//! resources are visible, and through which prefix? Entries keep whatever
//! cache they like between calls, but a resource whose backing bytes did not
//! change must come back as the *same* `Arc` so the oracle can detect that
//! nothing moved.
//!
//! Provided entries:
//! - [`DirectoryClassPathEntry`]: a directory tree, scanned or watched.
//! - [`ZipFileClassPathEntry`]: a `.jar` / `.zip` archive.
//! - [`MockClassPathEntry`]: in-memory, for tests.
//! - [`ExcludingClassPathEntry`]: hides resources of another entry.

pub mod archive;
pub mod directory;
pub mod excluding;
pub mod mock;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::logging::ScanLogger;
use crate::resource::{PathPrefixSet, Resource, ResourceResolution};
use crate::watch::{PrefixChangeManager, WatchRegistry};

pub use archive::{ZipFileClassPathEntry, ZipFileResource};
pub use directory::{DirectoryClassPathEntry, DirectoryResource};
pub use excluding::ExcludingClassPathEntry;
pub use mock::{MockClassPathEntry, MockResource};

/// File extensions recognised as archives.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];

/// A resource as found in one entry, plus the prefix that admitted it.
#[derive(Debug, Clone)]
pub struct ApplicableResource {
    pub resource: Arc<dyn Resource>,
    pub resolution: ResourceResolution,
}

/// Visible resources of one entry, keyed by their path inside the entry.
pub type ApplicableResources = BTreeMap<String, ApplicableResource>;

/// A source of resources on the classpath.
pub trait ClassPathEntry: Send + Sync + fmt::Debug {
    /// Stable, human-readable location. Two entries with the same location
    /// are the same entry.
    fn location(&self) -> &str;

    /// Resources visible through `prefixes`.
    ///
    /// Diagnostics go to `logger`; unreadable files are skipped with a
    /// warning. Errors are reserved for conditions the caller must surface,
    /// such as a symlink cycle or an unreadable archive.
    fn find_applicable_resources(
        &self,
        logger: &dyn ScanLogger,
        prefixes: &PathPrefixSet,
    ) -> Result<Arc<ApplicableResources>>;
}

impl fmt::Display for dyn ClassPathEntry + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.location())
    }
}

/// Resolve `resource` against `prefixes` and record it in `found` if visible.
pub(crate) fn admit(
    found: &mut ApplicableResources,
    prefixes: &PathPrefixSet,
    resource: Arc<dyn Resource>,
) -> bool {
    match prefixes.includes_resource(resource.path()) {
        Some(resolution) => {
            found.insert(
                resource.path().to_string(),
                ApplicableResource {
                    resource,
                    resolution,
                },
            );
            true
        }
        None => false,
    }
}

/// True if the path has a recognised archive extension.
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

/// Build the entry for a classpath element on disk.
///
/// Archives become [`ZipFileClassPathEntry`]; everything else is treated as
/// a directory, which contributes nothing while it does not exist.
pub fn entry_for_path(path: &Path) -> Arc<dyn ClassPathEntry> {
    if is_archive_path(path) {
        debug!(?path, "classpath element is an archive");
        Arc::new(ZipFileClassPathEntry::new(path))
    } else {
        debug!(?path, "classpath element is a directory");
        Arc::new(DirectoryClassPathEntry::new(path))
    }
}

/// Like [`entry_for_path`], but directories keep live results through
/// filesystem watching.
pub fn watched_entry_for_path(
    path: &Path,
    registry: &WatchRegistry,
    manager: &Arc<PrefixChangeManager>,
) -> Arc<dyn ClassPathEntry> {
    if is_archive_path(path) {
        Arc::new(ZipFileClassPathEntry::new(path))
    } else {
        Arc::new(DirectoryClassPathEntry::watched(path, registry, manager))
    }
}
