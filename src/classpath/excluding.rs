// src/classpath/excluding.rs

//! Decorator hiding resources of another entry.

use std::sync::{Arc, Mutex, PoisonError};

use crate::classpath::{ApplicableResources, ClassPathEntry};
use crate::errors::Result;
use crate::filters::is_default_excluded;
use crate::logging::ScanLogger;
use crate::resource::{PathPrefixSet, ResourceFilter};

/// Wraps an entry and drops every resource whose path `excluded` accepts.
///
/// Shares the delegate's location, so the oracle treats the two as the same
/// classpath element.
pub struct ExcludingClassPathEntry {
    delegate: Arc<dyn ClassPathEntry>,
    excluded: Arc<dyn ResourceFilter>,
    // Last delegate result and its filtered form; reused while the delegate
    // hands back the same object.
    last: Mutex<Option<(Arc<ApplicableResources>, Arc<ApplicableResources>)>>,
}

impl ExcludingClassPathEntry {
    pub fn new(delegate: Arc<dyn ClassPathEntry>, excluded: Arc<dyn ResourceFilter>) -> Self {
        Self {
            delegate,
            excluded,
            last: Mutex::new(None),
        }
    }

    /// Hide version-control metadata (`CVS/`, `.svn/`, `.DS_Store`, ...).
    pub fn excluding_vcs(delegate: Arc<dyn ClassPathEntry>) -> Self {
        Self::new(delegate, Arc::new(is_default_excluded))
    }

    pub fn delegate(&self) -> &Arc<dyn ClassPathEntry> {
        &self.delegate
    }
}

impl ClassPathEntry for ExcludingClassPathEntry {
    fn location(&self) -> &str {
        self.delegate.location()
    }

    fn find_applicable_resources(
        &self,
        logger: &dyn ScanLogger,
        prefixes: &PathPrefixSet,
    ) -> Result<Arc<ApplicableResources>> {
        let unfiltered = self.delegate.find_applicable_resources(logger, prefixes)?;

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((source, filtered)) = last.as_ref() {
            if Arc::ptr_eq(source, &unfiltered) {
                return Ok(Arc::clone(filtered));
            }
        }

        let filtered: ApplicableResources = unfiltered
            .iter()
            .filter(|(path, _)| !self.excluded.allows(path))
            .map(|(path, found)| (path.clone(), found.clone()))
            .collect();
        let filtered = Arc::new(filtered);
        *last = Some((unfiltered, Arc::clone(&filtered)));
        Ok(filtered)
    }
}

impl std::fmt::Debug for ExcludingClassPathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcludingClassPathEntry")
            .field("delegate", &self.delegate)
            .finish()
    }
}
