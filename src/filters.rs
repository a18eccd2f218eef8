// src/filters.rs

//! Ready-made [`ResourceFilter`]s.
//!
//! - [`is_default_excluded`] recognises version-control and OS droppings
//!   (`CVS/`, `.svn/`, `.DS_Store`, ...).
//! - [`GlobFilter`] combines Ant-style include/exclude globs with the
//!   default excludes and an optional "Java sources only" restriction.
//!
//! Globs are evaluated against the path as the prefix hands it over (the
//! rerooted path for rerooting prefixes). `*` does not cross `/`; `**` does.
//! A pattern ending in `/` matches everything below that directory.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::Result;
use crate::resource::ResourceFilter;

/// Directory names that are never visible.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["CVS", ".svn", "SCCS", ".git", ".hg"];

/// File names that are never visible.
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &[".cvsignore", "vssver.scc", ".DS_Store"];

pub const JAVA_SOURCE_SUFFIX: &str = ".java";

/// True if any segment of `path` is a VCS directory or the file itself is
/// one of the well-known droppings.
pub fn is_default_excluded(path: &str) -> bool {
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    while let Some(segment) = segments.next() {
        if DEFAULT_EXCLUDED_DIRS.contains(&segment) {
            return true;
        }
        if segments.peek().is_none() && DEFAULT_EXCLUDED_FILES.contains(&segment) {
            return true;
        }
    }
    false
}

/// Compiled include/exclude filter.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    includes: Option<GlobSet>,
    excludes: Option<GlobSet>,
    default_excludes: bool,
    java_only: bool,
}

impl GlobFilter {
    pub fn builder() -> GlobFilterBuilder {
        GlobFilterBuilder::default()
    }

    /// Accepts everything except the default excludes.
    pub fn default_excludes_only() -> Self {
        Self {
            includes: None,
            excludes: None,
            default_excludes: true,
            java_only: false,
        }
    }
}

impl ResourceFilter for GlobFilter {
    fn allows(&self, path: &str) -> bool {
        if self.java_only && !path.ends_with(JAVA_SOURCE_SUFFIX) {
            return false;
        }
        if self.default_excludes && is_default_excluded(path) {
            return false;
        }
        if let Some(includes) = &self.includes {
            if !includes.is_match(path) {
                return false;
            }
        }
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(path) {
                return false;
            }
        }
        true
    }
}

/// Builder for [`GlobFilter`]. An empty include list includes everything.
#[derive(Debug, Clone, Default)]
pub struct GlobFilterBuilder {
    includes: Vec<String>,
    excludes: Vec<String>,
    default_excludes: bool,
    java_only: bool,
}

impl GlobFilterBuilder {
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn includes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn default_excludes(mut self, enabled: bool) -> Self {
        self.default_excludes = enabled;
        self
    }

    pub fn java_only(mut self, enabled: bool) -> Self {
        self.java_only = enabled;
        self
    }

    pub fn build(self) -> Result<GlobFilter> {
        Ok(GlobFilter {
            includes: build_globset(&self.includes)?,
            excludes: build_globset(&self.excludes)?,
            default_excludes: self.default_excludes,
            java_only: self.java_only,
        })
    }
}

/// Build a GlobSet from Ant-style patterns; `None` when there are none.
fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let pat = if pat.ends_with('/') {
            format!("{pat}**")
        } else {
            pat.clone()
        };
        let glob = GlobBuilder::new(&pat).literal_separator(true).build()?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}
