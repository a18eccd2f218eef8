// src/config/model.rs

//! Serde model of an oracle description.
//!
//! ```toml
//! classpath = ["src", "lib/gwt-user.jar"]
//!
//! [options]
//! exclude_vcs = true
//! watch_directories = false
//!
//! [[prefix]]
//! path = "com/google/gwt/user/client/"
//! module = "com.google.gwt.user.User"
//! include = ["**/*.java"]
//! exclude = ["**/impl/**"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::classpath::{
    ClassPathEntry, ExcludingClassPathEntry, entry_for_path, watched_entry_for_path,
};
use crate::errors::Result;
use crate::filters::GlobFilter;
use crate::oracle::ResourceOracle;
use crate::resource::{PathPrefix, PathPrefixSet, ResourceFilter};
use crate::watch::{PrefixChangeManager, WatchRegistry};

fn default_true() -> bool {
    true
}

/// As read from TOML, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOracleConfig {
    #[serde(default)]
    pub options: OptionsSection,
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
    #[serde(default, rename = "prefix")]
    pub prefixes: Vec<PrefixConfig>,
}

/// `[options]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsSection {
    /// Wrap every entry so VCS metadata never shows up.
    #[serde(default = "default_true")]
    pub exclude_vcs: bool,
    /// Keep directory entries live through filesystem watching.
    #[serde(default)]
    pub watch_directories: bool,
}

impl Default for OptionsSection {
    fn default() -> Self {
        Self {
            exclude_vcs: true,
            watch_directories: false,
        }
    }
}

/// One `[[prefix]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixConfig {
    pub path: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_true")]
    pub default_excludes: bool,
    #[serde(default)]
    pub java_only: bool,
    #[serde(default)]
    pub reroot: bool,
}

impl PrefixConfig {
    /// Plain prefix without filter settings.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            module: None,
            include: Vec::new(),
            exclude: Vec::new(),
            default_excludes: true,
            java_only: false,
            reroot: false,
        }
    }

    fn needs_filter(&self) -> bool {
        !self.include.is_empty()
            || !self.exclude.is_empty()
            || self.default_excludes
            || self.java_only
    }

    pub(crate) fn build_filter(&self) -> Result<Option<Arc<dyn ResourceFilter>>> {
        if !self.needs_filter() {
            return Ok(None);
        }
        let filter = GlobFilter::builder()
            .includes(self.include.iter().cloned())
            .excludes(self.exclude.iter().cloned())
            .default_excludes(self.default_excludes)
            .java_only(self.java_only)
            .build()?;
        let filter: Arc<dyn ResourceFilter> = Arc::new(filter);
        Ok(Some(filter))
    }

    pub fn to_path_prefix(&self) -> Result<PathPrefix> {
        let prefix = PathPrefix::with_reroot(self.path.as_str(), self.build_filter()?, self.reroot);
        Ok(match &self.module {
            Some(module) => prefix.for_module(module.as_str()),
            None => prefix,
        })
    }
}

/// A validated oracle description.
///
/// Relative classpath elements resolve against [`base_dir`](Self::base_dir),
/// which the loader sets to the directory of the config file.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    base_dir: PathBuf,
    pub options: OptionsSection,
    pub classpath: Vec<PathBuf>,
    pub prefixes: Vec<PrefixConfig>,
}

impl OracleConfig {
    /// Build without validation; see [`TryFrom<RawOracleConfig>`] for the
    /// checked path.
    pub fn new_unchecked(
        options: OptionsSection,
        classpath: Vec<PathBuf>,
        prefixes: Vec<PrefixConfig>,
    ) -> Self {
        Self {
            base_dir: PathBuf::from("."),
            options,
            classpath,
            prefixes,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Classpath elements, relative ones joined onto the base directory.
    pub fn resolved_classpath(&self) -> Vec<PathBuf> {
        self.classpath
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.base_dir.join(p)
                }
            })
            .collect()
    }

    pub fn path_prefix_set(&self) -> Result<PathPrefixSet> {
        let mut set = PathPrefixSet::new();
        for prefix in &self.prefixes {
            set.add(prefix.to_path_prefix()?);
        }
        Ok(set)
    }

    /// Classpath entries in order. Directory entries are watched when
    /// `options.watch_directories` is set.
    pub fn class_path(
        &self,
        registry: &WatchRegistry,
        manager: &Arc<PrefixChangeManager>,
    ) -> Vec<Arc<dyn ClassPathEntry>> {
        self.resolved_classpath()
            .iter()
            .map(|path| {
                let entry = if self.options.watch_directories {
                    watched_entry_for_path(path, registry, manager)
                } else {
                    entry_for_path(path)
                };
                if self.options.exclude_vcs {
                    Arc::new(ExcludingClassPathEntry::excluding_vcs(entry)) as Arc<dyn ClassPathEntry>
                } else {
                    entry
                }
            })
            .collect()
    }

    /// An oracle over this classpath with the configured prefixes active.
    /// Nothing is scanned until the first refresh.
    pub fn build_oracle(
        &self,
        registry: &WatchRegistry,
        manager: &Arc<PrefixChangeManager>,
    ) -> Result<ResourceOracle> {
        let mut oracle = ResourceOracle::new(self.class_path(registry, manager));
        oracle.set_path_prefixes(self.path_prefix_set()?);
        Ok(oracle)
    }
}
