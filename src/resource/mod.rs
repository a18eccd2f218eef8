// src/resource/mod.rs

//! Resources and the prefixes that make them visible.
//!
//! A [`Resource`] is identified by the classpath entry that owns it plus its
//! path inside that entry. Once built, a resource never changes: a modified
//! file shows up as a *new* resource on the next scan, and the old one
//! reports itself as stale.

pub mod path_prefix;

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::SystemTime;

pub use path_prefix::{PathPrefix, PathPrefixSet, ResourceFilter, ResourceResolution};

/// A file-like resource contributed by a classpath entry.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Logical `/`-separated path, e.g. `com/example/client/Foo.java`.
    fn path(&self) -> &str;

    /// URL-like locator of the bytes: `file:...`, `jar:file:...!/...`, `mock:...`.
    fn location(&self) -> String;

    /// Location of the classpath entry that contributed this resource.
    fn entry_location(&self) -> &str;

    /// Modification time recorded when the resource was discovered.
    fn last_modified(&self) -> SystemTime;

    /// True once the backing bytes have changed or disappeared since this
    /// resource was discovered. Re-evaluated on every call.
    fn is_stale(&self) -> bool;

    /// Open the contents, or `None` if they are no longer available.
    fn open_contents(&self) -> Option<Box<dyn Read + Send>>;

    /// Read the whole contents, or `None` if they are no longer available.
    fn read_bytes(&self) -> Option<Vec<u8>> {
        let mut reader = self.open_contents()?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).ok()?;
        Some(buf)
    }
}

/// Identity of a shared resource, for "same object?" checks across scans.
pub fn resource_identity(resource: &Arc<dyn Resource>) -> *const () {
    Arc::as_ptr(resource) as *const ()
}

/// A resource published under a path with its prefix stripped.
#[derive(Debug)]
pub struct RerootedResource {
    path: String,
    inner: Arc<dyn Resource>,
}

impl RerootedResource {
    pub fn new(path: impl Into<String>, inner: Arc<dyn Resource>) -> Self {
        Self {
            path: path.into(),
            inner,
        }
    }

    /// The resource as its classpath entry sees it.
    pub fn inner(&self) -> &Arc<dyn Resource> {
        &self.inner
    }
}

impl Resource for RerootedResource {
    fn path(&self) -> &str {
        &self.path
    }

    fn location(&self) -> String {
        self.inner.location()
    }

    fn entry_location(&self) -> &str {
        self.inner.entry_location()
    }

    fn last_modified(&self) -> SystemTime {
        self.inner.last_modified()
    }

    fn is_stale(&self) -> bool {
        self.inner.is_stale()
    }

    fn open_contents(&self) -> Option<Box<dyn Read + Send>> {
        self.inner.open_contents()
    }
}
