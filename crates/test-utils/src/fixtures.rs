//! Classpath fixtures that exist as a directory, an archive, or in memory
//! with identical contents.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use classpath_oracle::classpath::{
    ClassPathEntry, DirectoryClassPathEntry, MockClassPathEntry, ZipFileClassPathEntry,
};
use classpath_oracle::resource::{PathPrefix, PathPrefixSet};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// How a fixture is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    Directory,
    Archive,
    Mock,
}

impl BackingKind {
    pub const ALL: [BackingKind; 3] = [BackingKind::Directory, BackingKind::Archive, BackingKind::Mock];
}

pub const CPE1_FILES: &[&str] = &[
    "com/google/gwt/user/User.gwt.xml",
    "com/google/gwt/user/client/Command.java",
    "com/google/gwt/user/client/Timer.java",
    "com/google/gwt/user/client/ui/Widget.java",
    "org/example/bar/client/BarClient1.txt",
    "org/example/bar/client/BarClient2.txt",
    "org/example/bar/client/etc/BarEtc.txt",
];

pub const CPE2_FILES: &[&str] = &[
    "com/google/gwt/i18n/I18N.gwt.xml",
    "com/google/gwt/i18n/client/Messages.java",
    "com/google/gwt/i18n/rebind/LocalizableGenerator.java",
    "org/example/bar/client/BarClient2.txt",
    "org/example/bar/client/BarClient3.txt",
    "org/example/foo/client/FooClient.java",
    "org/example/foo/client/BarClient1.txt",
];

/// Contents written for `path` in a fixture named `name`.
pub fn contents_of(name: &str, path: &str) -> String {
    format!("{name}:{path}")
}

/// A classpath entry plus whatever keeps it alive.
pub struct TestClassPath {
    pub name: String,
    pub kind: BackingKind,
    entry: Arc<dyn ClassPathEntry>,
    mock: Option<Arc<MockClassPathEntry>>,
    root: Option<PathBuf>,
    _temp: Option<TempDir>,
}

impl TestClassPath {
    pub fn build(kind: BackingKind, name: &str, files: &[&str]) -> Result<Self> {
        match kind {
            BackingKind::Directory => {
                let temp = tempfile::tempdir()?;
                let root = temp.path().join(name);
                for path in files {
                    write_file(&root, path, &contents_of(name, path))?;
                }
                Ok(Self {
                    name: name.to_string(),
                    kind,
                    entry: Arc::new(DirectoryClassPathEntry::new(&root)),
                    mock: None,
                    root: Some(root),
                    _temp: Some(temp),
                })
            }
            BackingKind::Archive => {
                let temp = tempfile::tempdir()?;
                let archive = temp.path().join(format!("{name}.jar"));
                let owned: Vec<(String, String)> = files
                    .iter()
                    .map(|p| (p.to_string(), contents_of(name, p)))
                    .collect();
                write_archive(&archive, &owned)?;
                Ok(Self {
                    name: name.to_string(),
                    kind,
                    entry: Arc::new(ZipFileClassPathEntry::new(&archive)),
                    mock: None,
                    root: Some(archive),
                    _temp: Some(temp),
                })
            }
            BackingKind::Mock => {
                let mock = Arc::new(MockClassPathEntry::new(format!("/{name}/")));
                for path in files {
                    mock.add_resource_with_contents(path, contents_of(name, path));
                }
                Ok(Self {
                    name: name.to_string(),
                    kind,
                    entry: Arc::clone(&mock) as Arc<dyn ClassPathEntry>,
                    mock: Some(mock),
                    root: None,
                    _temp: None,
                })
            }
        }
    }

    pub fn cpe1_as(kind: BackingKind) -> Result<Self> {
        Self::build(kind, "cpe1", CPE1_FILES)
    }

    pub fn cpe2_as(kind: BackingKind) -> Result<Self> {
        Self::build(kind, "cpe2", CPE2_FILES)
    }

    pub fn entry(&self) -> Arc<dyn ClassPathEntry> {
        Arc::clone(&self.entry)
    }

    /// The directory or archive on disk; `None` for mocks.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn mock(&self) -> Option<&Arc<MockClassPathEntry>> {
        self.mock.as_ref()
    }
}

/// Write `contents` to `root/rel`, creating parents.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, contents)?;
    Ok(path)
}

/// Write a zip archive holding `(path, contents)` pairs.
pub fn write_archive(archive: &Path, files: &[(String, String)]) -> Result<()> {
    let file = fs::File::create(archive)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (path, contents) in files {
        zip.start_file(path.as_str(), options)?;
        zip.write_all(contents.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

/// The four `client` packages spread over cpe1 and cpe2.
pub fn client_prefixes() -> PathPrefixSet {
    [
        "com/google/gwt/user/client/",
        "org/example/bar/client/",
        "org/example/foo/client/",
        "com/google/gwt/i18n/client/",
    ]
    .into_iter()
    .map(|p| PathPrefix::new(p, None))
    .collect()
}

/// Logical paths `client_prefixes` selects from cpe1 followed by cpe2.
pub const CLIENT_PATHS: &[&str] = &[
    "com/google/gwt/i18n/client/Messages.java",
    "com/google/gwt/user/client/Command.java",
    "com/google/gwt/user/client/Timer.java",
    "com/google/gwt/user/client/ui/Widget.java",
    "org/example/bar/client/BarClient1.txt",
    "org/example/bar/client/BarClient2.txt",
    "org/example/bar/client/BarClient3.txt",
    "org/example/bar/client/etc/BarEtc.txt",
    "org/example/foo/client/BarClient1.txt",
    "org/example/foo/client/FooClient.java",
];
