// src/watch/mod.rs

//! File watching and live resource tracking.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`), one
//!   registration per directory, safe against symlink cycles.
//! - [`ChangedFileAccumulator`]: "what changed since I last asked?".
//! - [`ResourceAccumulator`]: a directory's visible resources, kept current
//!   from change events.
//! - [`PrefixChangeManager`]: pushing prefix-set changes to accumulators.
//!
//! All per-oracle state lives in explicit instances ([`WatchRegistry`],
//! [`PrefixChangeManager`]); nothing here is global.

pub mod changed_files;
pub mod path_utils;
pub mod prefix_change;
pub mod resource_accumulator;
pub mod watcher;

pub use changed_files::ChangedFileAccumulator;
pub use prefix_change::{PrefixChangeManager, PrefixRegistration};
pub use resource_accumulator::ResourceAccumulator;
pub use watcher::{
    ChangeKind, ChangeListener, DirectoryWatcher, FileChange, ListenerId, WatchRegistry, WatchScope,
};
