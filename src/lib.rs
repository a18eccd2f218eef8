// src/lib.rs

//! `classpath-oracle`: resolve, cache and incrementally refresh the
//! resources visible across an ordered classpath of directories, archives
//! and in-memory roots.

pub mod classpath;
pub mod config;
pub mod errors;
pub mod filters;
pub mod fs;
pub mod logging;
pub mod oracle;
pub mod resource;
pub mod watch;

pub use classpath::{
    ApplicableResource, ApplicableResources, ClassPathEntry, DirectoryClassPathEntry,
    ExcludingClassPathEntry, MockClassPathEntry, ZipFileClassPathEntry,
};
pub use errors::{OracleError, Result};
pub use logging::{ScanLogger, TracingLogger};
pub use oracle::{ResourceMap, ResourceOracle};
pub use resource::{PathPrefix, PathPrefixSet, Resource, ResourceFilter, ResourceResolution};
pub use watch::{
    ChangedFileAccumulator, PrefixChangeManager, ResourceAccumulator, WatchRegistry, WatchScope,
};
