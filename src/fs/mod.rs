// src/fs/mod.rs

//! Filesystem collaborator used by directory classpath entries.
//!
//! Directory scans and [`DirectoryResource`](crate::classpath::directory::DirectoryResource)
//! content access go through [`FileSystem`] so tests can swap in
//! [`mock::MockFileSystem`]. Watching always uses the real filesystem.

use std::fmt::Debug;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// Modification time and size of a file. Two stamps that differ in either
/// mean the file was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

impl FileStamp {
    pub fn from_metadata(meta: &fs::Metadata) -> std::io::Result<Self> {
        Ok(Self {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
    fn exists(&self, path: &Path) -> bool;
    /// Follows symlinks.
    fn is_file(&self, path: &Path) -> bool;
    /// Follows symlinks.
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
    /// Follows symlinks.
    fn stamp(&self, path: &Path) -> Result<FileStamp>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).with_context(|| format!("opening file {:?}", path))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn stamp(&self, path: &Path) -> Result<FileStamp> {
        let meta = fs::metadata(path).with_context(|| format!("stat {:?}", path))?;
        FileStamp::from_metadata(&meta).with_context(|| format!("reading mtime of {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

/// Name of the last path component, if it is valid UTF-8.
pub(crate) fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Hidden directories (`.svn`, `.git`, ...) are never descended into.
pub(crate) fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// True if any directory segment of a `/`-separated resource path is
/// hidden. The file name itself is not checked.
pub(crate) fn in_hidden_directory(rel: &str) -> bool {
    let mut segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    segments.into_iter().any(is_hidden_name)
}
