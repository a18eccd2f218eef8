// src/classpath/mock.rs

//! In-memory classpath entry for tests.
//!
//! Resources are added, updated and removed explicitly. An update always
//! produces a new resource object; the replaced one reports itself stale.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime};

use crate::classpath::{ApplicableResources, ClassPathEntry, admit};
use crate::errors::Result;
use crate::logging::ScanLogger;
use crate::resource::{PathPrefixSet, Resource};

#[derive(Debug, Default)]
struct MockEntryState {
    resources: Mutex<BTreeMap<String, Arc<MockResource>>>,
    clock: AtomicU64,
}

impl MockEntryState {
    fn resources(&self) -> MutexGuard<'_, BTreeMap<String, Arc<MockResource>>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct MockResource {
    entry_location: String,
    path: String,
    contents: Vec<u8>,
    last_modified: SystemTime,
    owner: Weak<MockEntryState>,
}

impl Resource for MockResource {
    fn path(&self) -> &str {
        &self.path
    }

    fn location(&self) -> String {
        format!("mock:{}{}", self.entry_location, self.path)
    }

    fn entry_location(&self) -> &str {
        &self.entry_location
    }

    fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Stale once the owning entry no longer holds this exact object.
    fn is_stale(&self) -> bool {
        let Some(owner) = self.owner.upgrade() else {
            return true;
        };
        let resources = owner.resources();
        match resources.get(&self.path) {
            Some(current) => !std::ptr::eq(Arc::as_ptr(current), self),
            None => true,
        }
    }

    fn open_contents(&self) -> Option<Box<dyn Read + Send>> {
        if self.is_stale() {
            return None;
        }
        Some(Box::new(Cursor::new(self.contents.clone())))
    }
}

#[derive(Debug)]
pub struct MockClassPathEntry {
    location: String,
    state: Arc<MockEntryState>,
}

impl MockClassPathEntry {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            state: Arc::new(MockEntryState::default()),
        }
    }

    /// Add a resource with empty contents. Replaces any resource at `path`.
    pub fn add_resource(&self, path: &str) -> Arc<MockResource> {
        self.put(path, Vec::new())
    }

    pub fn add_resource_with_contents(
        &self,
        path: &str,
        contents: impl Into<Vec<u8>>,
    ) -> Arc<MockResource> {
        self.put(path, contents.into())
    }

    /// Replace the resource at `path` with a fresh object, keeping its
    /// contents. Adds it if absent.
    pub fn update_resource(&self, path: &str) -> Arc<MockResource> {
        let contents = self
            .state
            .resources()
            .get(path)
            .map(|r| r.contents.clone())
            .unwrap_or_default();
        self.put(path, contents)
    }

    /// Returns false if nothing was stored at `path`.
    pub fn remove_resource(&self, path: &str) -> bool {
        self.state.resources().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.state.resources().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, path: &str, contents: Vec<u8>) -> Arc<MockResource> {
        let tick = self.state.clock.fetch_add(1, Ordering::Relaxed) + 1;
        let resource = Arc::new(MockResource {
            entry_location: self.location.clone(),
            path: path.to_string(),
            contents,
            last_modified: SystemTime::UNIX_EPOCH + Duration::from_secs(tick),
            owner: Arc::downgrade(&self.state),
        });
        self.state
            .resources()
            .insert(path.to_string(), Arc::clone(&resource));
        resource
    }
}

impl ClassPathEntry for MockClassPathEntry {
    fn location(&self) -> &str {
        &self.location
    }

    fn find_applicable_resources(
        &self,
        _logger: &dyn ScanLogger,
        prefixes: &PathPrefixSet,
    ) -> Result<Arc<ApplicableResources>> {
        let resources = self.state.resources();
        let mut found = ApplicableResources::new();
        for resource in resources.values() {
            admit(&mut found, prefixes, Arc::clone(resource) as Arc<dyn Resource>);
        }
        Ok(Arc::new(found))
    }
}
