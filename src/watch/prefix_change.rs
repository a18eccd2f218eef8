// src/watch/prefix_change.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use crate::errors::Result;
use crate::resource::PathPrefixSet;
use crate::watch::resource_accumulator::ResourceAccumulator;

/// Tells live [`ResourceAccumulator`]s when the prefix set they follow has
/// changed.
///
/// One manager is shared by all watched directory entries of an oracle.
/// Registrations are explicit: each [`register`](Self::register) returns a
/// [`PrefixRegistration`] that unregisters on [`close`](PrefixRegistration::close)
/// or drop.
#[derive(Default)]
pub struct PrefixChangeManager {
    registrations: Mutex<HashMap<u64, Arc<ResourceAccumulator>>>,
    next_id: AtomicU64,
}

impl PrefixChangeManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn registrations(&self) -> MutexGuard<'_, HashMap<u64, Arc<ResourceAccumulator>>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(self: &Arc<Self>, accumulator: Arc<ResourceAccumulator>) -> PrefixRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registrations().insert(id, accumulator);
        PrefixRegistration {
            id,
            manager: Arc::downgrade(self),
            closed: false,
        }
    }

    /// Rescan every accumulator following `prefixes` whose copy is out of
    /// date. Returns how many were updated; the first failure is returned
    /// after all have been tried.
    pub fn path_prefixes_changed(&self, prefixes: &PathPrefixSet) -> Result<usize> {
        let stale: Vec<Arc<ResourceAccumulator>> = self
            .registrations()
            .values()
            .filter(|acc| {
                acc.source_id() == prefixes.id() && acc.source_version() != prefixes.version()
            })
            .cloned()
            .collect();

        let mut first_error = None;
        let mut updated = 0;
        for accumulator in stale {
            match accumulator.set_path_prefixes(prefixes) {
                Ok(()) => updated += 1,
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        debug!(set = prefixes.id(), version = prefixes.version(), updated, "path prefixes changed");
        match first_error {
            Some(err) => Err(err),
            None => Ok(updated),
        }
    }

    pub fn registration_count(&self) -> usize {
        self.registrations().len()
    }

    fn unregister(&self, id: u64) {
        let removed = self.registrations().remove(&id);
        if let Some(accumulator) = removed {
            accumulator.shutdown();
        }
    }
}

impl std::fmt::Debug for PrefixChangeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixChangeManager")
            .field("registrations", &self.registration_count())
            .finish()
    }
}

/// Live registration with a [`PrefixChangeManager`].
#[derive(Debug)]
pub struct PrefixRegistration {
    id: u64,
    manager: Weak<PrefixChangeManager>,
    closed: bool,
}

impl PrefixRegistration {
    /// Unregister and stop the accumulator.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(manager) = self.manager.upgrade() {
            manager.unregister(self.id);
        }
    }
}

impl Drop for PrefixRegistration {
    fn drop(&mut self) {
        self.release();
    }
}
