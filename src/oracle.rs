// src/oracle.rs

//! The resource oracle: one consistent `path -> resource` view over an
//! ordered classpath.
//!
//! [`ResourceOracle::refresh`] asks every entry for its visible resources
//! and merges them. When two entries offer the same logical path, the
//! earlier entry wins (shadowing) unless the later one came in through a
//! stronger prefix (see [`PathPrefix::is_preferred_over`]).
//!
//! Results are published as a snapshot of shared, immutable collections.
//! A refresh that finds the same resources behind the same prefixes keeps
//! the previous snapshot, so `Arc::ptr_eq` on any accessor is a cheap
//! "nothing changed" test.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{Level, debug, info};

use crate::classpath::{ClassPathEntry, entry_for_path};
use crate::errors::Result;
use crate::logging::ScanLogger;
use crate::resource::{
    PathPrefix, PathPrefixSet, RerootedResource, Resource, ResourceResolution, resource_identity,
};

/// Published resources keyed by logical path.
pub type ResourceMap = BTreeMap<String, Arc<dyn Resource>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    // Address of the entry's resource; kept alive by the snapshot.
    identity: usize,
    prefix: String,
    reroot: bool,
    modules: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    resources: Arc<Vec<Arc<dyn Resource>>>,
    resource_map: Arc<ResourceMap>,
    path_names: Arc<BTreeSet<String>>,
    resolutions: BTreeMap<String, ResourceResolution>,
    fingerprints: BTreeMap<String, Fingerprint>,
}

struct Candidate {
    resource: Arc<dyn Resource>,
    resolution: ResourceResolution,
}

/// Merges an ordered classpath under the active [`PathPrefixSet`].
///
/// `refresh` performs blocking I/O and takes `&mut self`; share an oracle
/// across threads behind a lock.
#[derive(Debug)]
pub struct ResourceOracle {
    class_path: Vec<Arc<dyn ClassPathEntry>>,
    prefixes: PathPrefixSet,
    snapshot: Snapshot,
}

impl ResourceOracle {
    /// Entries with a location already seen are dropped, first one wins.
    pub fn new(class_path: impl IntoIterator<Item = Arc<dyn ClassPathEntry>>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for entry in class_path {
            if seen.insert(entry.location().to_string()) {
                kept.push(entry);
            } else {
                debug!(location = entry.location(), "dropping duplicate classpath entry");
            }
        }
        Self {
            class_path: kept,
            prefixes: PathPrefixSet::new(),
            snapshot: Snapshot::default(),
        }
    }

    /// Build entries for directories and archives on disk.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::new(paths.into_iter().map(|p| entry_for_path(p.as_ref())))
    }

    pub fn class_path(&self) -> &[Arc<dyn ClassPathEntry>] {
        &self.class_path
    }

    pub fn path_prefixes(&self) -> &PathPrefixSet {
        &self.prefixes
    }

    /// Mutate the active set in place; takes effect on the next refresh.
    pub fn path_prefixes_mut(&mut self) -> &mut PathPrefixSet {
        &mut self.prefixes
    }

    /// Replace the active set. Does not scan.
    pub fn set_path_prefixes(&mut self, prefixes: PathPrefixSet) {
        self.prefixes = prefixes;
    }

    /// Rescan the classpath. Returns true if a new snapshot was published.
    ///
    /// A symlink cycle in any entry aborts the refresh with
    /// [`OracleError::FilesystemCycle`](crate::errors::OracleError::FilesystemCycle)
    /// and leaves the previous snapshot in place. Other entry failures are
    /// reported to `logger` and the entry is skipped.
    pub fn refresh(&mut self, logger: &dyn ScanLogger) -> Result<bool> {
        let mut winners: BTreeMap<String, Candidate> = BTreeMap::new();

        for entry in &self.class_path {
            let found = match entry.find_applicable_resources(logger, &self.prefixes) {
                Ok(found) => found,
                Err(err) if err.is_cycle() => return Err(err),
                Err(err) => {
                    logger.log(
                        Level::WARN,
                        &format!("Unable to scan classpath entry {}", entry.location()),
                        Some(&err),
                    );
                    continue;
                }
            };
            debug!(location = entry.location(), resources = found.len(), "scanned entry");

            for (path, applicable) in found.iter() {
                let prefix = &applicable.resolution.path_prefix;
                let logical = prefix.logical_path(path);
                if let Some(existing) = winners.get(logical) {
                    if !prefix.is_preferred_over(&existing.resolution.path_prefix) {
                        continue;
                    }
                }
                winners.insert(
                    logical.to_string(),
                    Candidate {
                        resource: Arc::clone(&applicable.resource),
                        resolution: applicable.resolution.clone(),
                    },
                );
            }
        }

        let fingerprints: BTreeMap<String, Fingerprint> = winners
            .iter()
            .map(|(logical, c)| (logical.clone(), fingerprint(c)))
            .collect();

        if fingerprints == self.snapshot.fingerprints {
            debug!(resources = fingerprints.len(), "classpath unchanged");
            return Ok(false);
        }

        self.snapshot = self.publish(winners, fingerprints);
        info!(
            entries = self.class_path.len(),
            resources = self.snapshot.resource_map.len(),
            "published new resource snapshot"
        );
        Ok(true)
    }

    fn publish(
        &self,
        winners: BTreeMap<String, Candidate>,
        fingerprints: BTreeMap<String, Fingerprint>,
    ) -> Snapshot {
        let previous = &self.snapshot;
        let mut resource_map = ResourceMap::new();
        let mut resolutions = BTreeMap::new();

        for (logical, candidate) in winners {
            let unchanged = previous.fingerprints.get(&logical) == fingerprints.get(&logical);
            let published = match previous.resource_map.get(&logical) {
                Some(old) if unchanged => Arc::clone(old),
                _ if candidate.resolution.path_prefix.should_reroot() => {
                    let rerooted: Arc<dyn Resource> = Arc::new(RerootedResource::new(
                        logical.clone(),
                        Arc::clone(&candidate.resource),
                    ));
                    rerooted
                }
                _ => Arc::clone(&candidate.resource),
            };
            resource_map.insert(logical.clone(), published);
            resolutions.insert(logical, candidate.resolution);
        }

        let resources: Vec<Arc<dyn Resource>> = resource_map.values().cloned().collect();
        let path_names: BTreeSet<String> = resource_map.keys().cloned().collect();
        Snapshot {
            resources: Arc::new(resources),
            resource_map: Arc::new(resource_map),
            path_names: Arc::new(path_names),
            resolutions,
            fingerprints,
        }
    }

    /// Every published resource, ordered by logical path.
    pub fn resources(&self) -> Arc<Vec<Arc<dyn Resource>>> {
        Arc::clone(&self.snapshot.resources)
    }

    pub fn resource_map(&self) -> Arc<ResourceMap> {
        Arc::clone(&self.snapshot.resource_map)
    }

    pub fn path_names(&self) -> Arc<BTreeSet<String>> {
        Arc::clone(&self.snapshot.path_names)
    }

    pub fn get_resource(&self, path: &str) -> Option<Arc<dyn Resource>> {
        self.snapshot.resource_map.get(path).cloned()
    }

    /// How the resource published at `path` was admitted.
    pub fn resolution(&self, path: &str) -> Option<&ResourceResolution> {
        self.snapshot.resolutions.get(path)
    }

    /// Warn about every resource that more than one module's prefixes
    /// include.
    pub fn print_overlapping_module_include_warnings(&self, logger: &dyn ScanLogger) {
        for (path, resolution) in &self.snapshot.resolutions {
            if resolution.module_names.len() > 1 {
                let modules: Vec<&str> =
                    resolution.module_names.iter().map(String::as_str).collect();
                logger.warn(&format!(
                    "Resource {path} is included by multiple modules ({}).",
                    modules.join(", ")
                ));
            }
        }
    }
}

fn fingerprint(candidate: &Candidate) -> Fingerprint {
    let prefix: &PathPrefix = &candidate.resolution.path_prefix;
    Fingerprint {
        identity: resource_identity(&candidate.resource) as usize,
        prefix: prefix.prefix().to_string(),
        reroot: prefix.should_reroot(),
        modules: candidate.resolution.module_names.clone(),
    }
}
