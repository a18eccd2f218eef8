// src/resource/path_prefix.rs

//! Path prefixes and the trie that matches resources against them.
//!
//! A [`PathPrefixSet`] answers two questions during a scan:
//! - [`includes_directory`](PathPrefixSet::includes_directory): is it worth
//!   descending into this directory at all?
//! - [`includes_resource`](PathPrefixSet::includes_resource): which prefix
//!   (if any) makes this file visible?
//!
//! Matching is longest-prefix-wins. The filter of the longest prefix is the
//! only filter consulted: when it rejects a path, shorter prefixes are not
//! tried as a fallback.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

/// Predicate deciding whether a path under a prefix is visible.
///
/// Closures `Fn(&str) -> bool` implement this directly.
pub trait ResourceFilter: Send + Sync {
    fn allows(&self, path: &str) -> bool;
}

impl<F> ResourceFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn allows(&self, path: &str) -> bool {
        self(path)
    }
}

/// A logical path prefix plus optional filter and reroot flag.
///
/// The prefix string is a `/`-separated directory path ending in `/`, or
/// empty to match everything. Values are immutable; the priority is assigned
/// by the [`PathPrefixSet`] the prefix is added to.
#[derive(Clone)]
pub struct PathPrefix {
    prefix: String,
    filter: Option<Arc<dyn ResourceFilter>>,
    reroot: bool,
    module_name: Option<String>,
    priority: u32,
}

impl PathPrefix {
    /// A trailing `/` is appended to non-empty prefixes that lack one.
    pub fn new(prefix: impl Into<String>, filter: Option<Arc<dyn ResourceFilter>>) -> Self {
        Self::with_reroot(prefix, filter, false)
    }

    pub fn with_reroot(
        prefix: impl Into<String>,
        filter: Option<Arc<dyn ResourceFilter>>,
        reroot: bool,
    ) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            prefix,
            filter,
            reroot,
            module_name: None,
            priority: 0,
        }
    }

    /// Same prefix, tagged with the name of the module that contributed it.
    pub fn for_module(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn should_reroot(&self) -> bool {
        self.reroot
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Insertion rank inside the owning set; later additions rank higher.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// True if `path` lies under this prefix and the filter (if any) accepts
    /// it. Rerooting prefixes hand the rerooted path to their filter.
    pub fn allows(&self, path: &str) -> bool {
        if !path.starts_with(&self.prefix) {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) if self.reroot => filter.allows(self.rerooted_path(path)),
            Some(filter) => filter.allows(path),
        }
    }

    /// `path` with this prefix stripped. Callers must check
    /// `path.starts_with(self.prefix())` first.
    pub fn rerooted_path<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
    }

    /// Logical path under which a resource at `path` is published.
    pub fn logical_path<'a>(&self, path: &'a str) -> &'a str {
        if self.reroot {
            self.rerooted_path(path)
        } else {
            path
        }
    }

    /// Whether a resource resolved through `self` should replace one resolved
    /// through `other` at the same logical path. Rerooted prefixes win over
    /// plain ones, then the higher priority wins. Equal standing keeps the
    /// existing resource, which is what makes earlier classpath entries shadow
    /// later ones.
    pub fn is_preferred_over(&self, other: &PathPrefix) -> bool {
        if self.reroot != other.reroot {
            return self.reroot;
        }
        self.priority > other.priority
    }

    fn same_filter(&self, other: &PathPrefix) -> bool {
        match (&self.filter, &other.filter) {
            (None, None) => true,
            (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl PartialEq for PathPrefix {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix
            && self.reroot == other.reroot
            && self.module_name == other.module_name
            && self.same_filter(other)
    }
}

impl Eq for PathPrefix {}

impl fmt::Debug for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPrefix")
            .field("prefix", &self.prefix)
            .field("filtered", &self.filter.is_some())
            .field("reroot", &self.reroot)
            .field("module", &self.module_name)
            .field("priority", &self.priority)
            .finish()
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if self.reroot {
            write!(f, " (rerooted)")?;
        }
        Ok(())
    }
}

/// Why a resource is visible: the winning prefix plus every module whose
/// prefix would also accept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResolution {
    pub path_prefix: PathPrefix,
    pub module_names: BTreeSet<String>,
}

impl ResourceResolution {
    pub fn new(path_prefix: PathPrefix) -> Self {
        let module_names = path_prefix
            .module_name()
            .map(|m| BTreeSet::from([m.to_string()]))
            .unwrap_or_default();
        Self {
            path_prefix,
            module_names,
        }
    }
}

#[derive(Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    prefix: Option<PathPrefix>,
}

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

fn next_set_id() -> u64 {
    NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)
}

/// The active collection of [`PathPrefix`]es, organised as a trie keyed by
/// path segment.
///
/// Every instance has a process-unique [`id`](Self::id) and a
/// [`version`](Self::version) bumped on each mutation; together they let
/// classpath entries cache results per set without holding on to the set.
/// Cloning yields a new id.
pub struct PathPrefixSet {
    id: u64,
    version: u64,
    root: TrieNode,
    // Keyed by textual prefix, in insertion order.
    prefixes: IndexMap<String, PathPrefix>,
    next_priority: u32,
}

impl PathPrefixSet {
    pub fn new() -> Self {
        Self {
            id: next_set_id(),
            version: 0,
            root: TrieNode::default(),
            prefixes: IndexMap::new(),
            next_priority: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Prefixes in insertion order, priorities assigned.
    pub fn values(&self) -> impl Iterator<Item = &PathPrefix> {
        self.prefixes.values()
    }

    /// Insert `prefix`, replacing any prefix with the same textual path.
    /// Returns true if an earlier prefix was replaced.
    pub fn add(&mut self, mut prefix: PathPrefix) -> bool {
        self.next_priority += 1;
        prefix.priority = self.next_priority;
        self.version += 1;

        let mut node = &mut self.root;
        for segment in segments(&prefix.prefix) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.prefix = Some(prefix.clone());

        let key = prefix.prefix.clone();
        // Re-inserting moves the key to the end so `values()` stays in
        // priority order.
        let replaced = self.prefixes.shift_remove(&key).is_some();
        self.prefixes.insert(key, prefix);
        replaced
    }

    /// True if `dir_path` lies under some prefix or is an ancestor of one.
    /// A trailing `/` on `dir_path` is optional.
    pub fn includes_directory(&self, dir_path: &str) -> bool {
        let mut node = &self.root;
        if node.prefix.is_some() {
            return true;
        }
        for segment in segments(dir_path) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
            if node.prefix.is_some() {
                return true;
            }
        }
        // Every segment matched: `dir_path` is an ancestor of a stored prefix.
        true
    }

    /// Resolve `resource_path` against the set.
    ///
    /// The deepest prefix that is a directory-prefix of `resource_path` wins
    /// and its filter decides; if that filter rejects the path the result is
    /// `None` even when a shorter prefix would accept it.
    pub fn includes_resource(&self, resource_path: &str) -> Option<ResourceResolution> {
        let dir_segments = match resource_path.rfind('/') {
            Some(idx) => &resource_path[..idx],
            None => "",
        };

        let mut chain: Vec<&PathPrefix> = Vec::new();
        let mut node = &self.root;
        if let Some(p) = &node.prefix {
            chain.push(p);
        }
        for segment in segments(dir_segments) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => break,
            }
            if let Some(p) = &node.prefix {
                chain.push(p);
            }
        }

        let winner = *chain.last()?;
        if !winner.allows(resource_path) {
            return None;
        }

        let mut resolution = ResourceResolution::new(winner.clone());
        for p in &chain {
            if let Some(module) = p.module_name() {
                if p.allows(resource_path) {
                    resolution.module_names.insert(module.to_string());
                }
            }
        }
        Some(resolution)
    }
}

impl Default for PathPrefixSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PathPrefixSet {
    fn clone(&self) -> Self {
        let mut copy = PathPrefixSet::new();
        for prefix in self.prefixes.values() {
            copy.add(prefix.clone());
        }
        copy
    }
}

impl fmt::Debug for PathPrefixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPrefixSet")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("prefixes", &self.prefixes.values().collect::<Vec<_>>())
            .finish()
    }
}

impl FromIterator<PathPrefix> for PathPrefixSet {
    fn from_iter<I: IntoIterator<Item = PathPrefix>>(iter: I) -> Self {
        let mut set = PathPrefixSet::new();
        for prefix in iter {
            set.add(prefix);
        }
        set
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
