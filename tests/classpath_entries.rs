mod common;

use std::sync::Arc;
use std::time::Duration;

use classpath_oracle::classpath::{
    ClassPathEntry, DirectoryClassPathEntry, ExcludingClassPathEntry, MockClassPathEntry,
    ZipFileClassPathEntry,
};
use classpath_oracle::fs::mock::MockFileSystem;
use classpath_oracle::resource::{PathPrefix, PathPrefixSet};
use classpath_oracle::{OracleError, Resource, TracingLogger};
use classpath_oracle_test_utils::RecordingLogger;
use classpath_oracle_test_utils::fixtures::{
    BackingKind, TestClassPath, client_prefixes, write_archive, write_file,
};
use common::{init_tracing, prefix};

fn paths_of(entry: &dyn ClassPathEntry, prefixes: &PathPrefixSet) -> Vec<String> {
    entry
        .find_applicable_resources(&TracingLogger, prefixes)
        .unwrap()
        .keys()
        .cloned()
        .collect()
}

fn everything() -> PathPrefixSet {
    let mut set = PathPrefixSet::new();
    set.add(prefix(""));
    set
}

#[test]
fn test_directory_entry_on_mock_filesystem() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/cp/com/google/gwt/user/User.gwt.xml", "<module/>");
    fs.add_file("/cp/com/google/gwt/user/client/Command.java", "class Command {}");
    fs.add_file("/cp/com/google/gwt/user/client/ui/Widget.java", "class Widget {}");
    fs.add_file("/cp/com/google/gwt/user/client/.svn/entries", "svn");
    fs.add_file("/cp/org/other/Unrelated.java", "");

    let entry = DirectoryClassPathEntry::with_fs("/cp", Arc::new(fs.clone()));
    assert_eq!(entry.location(), "file:/cp/");

    let mut prefixes = PathPrefixSet::new();
    prefixes.add(prefix("com/google/gwt/user/client/"));
    assert_eq!(
        paths_of(&entry, &prefixes),
        vec![
            "com/google/gwt/user/client/Command.java",
            "com/google/gwt/user/client/ui/Widget.java",
        ]
    );

    let found = entry
        .find_applicable_resources(&TracingLogger, &prefixes)
        .unwrap();
    let command = &found["com/google/gwt/user/client/Command.java"].resource;
    assert_eq!(command.location(), "file:/cp/com/google/gwt/user/client/Command.java");
    assert_eq!(command.read_bytes().unwrap(), b"class Command {}");
}

#[test]
fn test_directory_entry_skips_hidden_directories_even_with_catch_all_prefix() {
    let fs = MockFileSystem::new();
    fs.add_file("/cp/a/Visible.java", "");
    fs.add_file("/cp/.git/config", "");
    fs.add_file("/cp/a/.hidden/Secret.java", "");
    fs.add_file("/cp/a/.dotfile", "");
    fs.add_dir("/cp/a/empty");

    let entry = DirectoryClassPathEntry::with_fs("/cp", Arc::new(fs));
    assert_eq!(entry.dir(), std::path::Path::new("/cp"));
    assert!(!entry.is_watched());
    assert_eq!(
        paths_of(&entry, &everything()),
        vec!["a/.dotfile", "a/Visible.java"]
    );
}

#[test]
fn test_directory_entry_reuses_unchanged_resources() {
    let fs = MockFileSystem::new();
    fs.add_file("/cp/a/One.java", "1");
    fs.add_file("/cp/a/Two.java", "2");
    let entry = DirectoryClassPathEntry::with_fs("/cp", Arc::new(fs.clone()));
    let prefixes = everything();

    let first = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    fs.add_file("/cp/a/Two.java", "2 changed");
    let second = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();

    assert!(Arc::ptr_eq(&first["a/One.java"].resource, &second["a/One.java"].resource));
    assert!(!Arc::ptr_eq(&first["a/Two.java"].resource, &second["a/Two.java"].resource));
    assert!(first["a/Two.java"].resource.is_stale());
    assert!(!second["a/Two.java"].resource.is_stale());

    fs.remove("/cp/a/One.java");
    assert!(first["a/One.java"].resource.is_stale());
    assert!(first["a/One.java"].resource.open_contents().is_none());
    let third = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    assert_eq!(third.keys().collect::<Vec<_>>(), vec!["a/Two.java"]);
}

#[test]
fn test_directory_entry_notices_rewrite_with_same_mtime() {
    let fs = MockFileSystem::new();
    fs.add_file("/cp/a/One.java", "class One {}");
    let entry = DirectoryClassPathEntry::with_fs("/cp", Arc::new(fs.clone()));
    let prefixes = everything();

    let first = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    let before = first["a/One.java"].resource.last_modified();
    fs.rewrite_in_place("/cp/a/One.java", "class One { int x; }").unwrap();
    assert!(first["a/One.java"].resource.is_stale());

    let second = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    let one = &second["a/One.java"].resource;
    assert!(!Arc::ptr_eq(&first["a/One.java"].resource, one));
    assert_eq!(one.last_modified(), before);
    assert_eq!(one.read_bytes().unwrap(), b"class One { int x; }");
    assert!(!one.is_stale());
}

#[test]
fn test_missing_directory_contributes_nothing() {
    let fs = MockFileSystem::new();
    let entry = DirectoryClassPathEntry::with_fs("/nowhere", Arc::new(fs));
    let logger = RecordingLogger::new();
    let found = entry.find_applicable_resources(&logger, &everything()).unwrap();
    assert!(found.is_empty());
    assert!(logger.warnings().is_empty());
}

#[test]
fn test_directory_entry_prunes_directories_outside_prefixes() {
    let temp = tempfile::tempdir().unwrap();
    write_file(temp.path(), "com/google/gwt/user/client/Command.java", "").unwrap();
    write_file(temp.path(), "org/example/Other.java", "").unwrap();
    let entry = DirectoryClassPathEntry::new(temp.path());

    let mut prefixes = PathPrefixSet::new();
    prefixes.add(prefix("com/google/"));
    assert_eq!(
        paths_of(&entry, &prefixes),
        vec!["com/google/gwt/user/client/Command.java"]
    );
}

#[cfg(unix)]
#[test]
fn test_directory_entry_reports_symlink_cycle() {
    use std::os::unix::fs::symlink;

    let temp = tempfile::tempdir().unwrap();
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    write_file(&a, "A.java", "").unwrap();
    write_file(&b, "B.java", "").unwrap();
    symlink(&b, a.join("link")).unwrap();
    symlink(&a, b.join("link")).unwrap();

    let entry = DirectoryClassPathEntry::new(temp.path());
    let err = entry
        .find_applicable_resources(&TracingLogger, &everything())
        .unwrap_err();
    assert!(err.is_cycle(), "unexpected error: {err}");
    assert!(matches!(err, OracleError::FilesystemCycle { .. }));
}

#[cfg(unix)]
#[test]
fn test_directory_entry_follows_acyclic_symlinks() {
    use std::os::unix::fs::symlink;

    let temp = tempfile::tempdir().unwrap();
    let shared = tempfile::tempdir().unwrap();
    write_file(shared.path(), "Shared.java", "").unwrap();
    write_file(temp.path(), "own/Own.java", "").unwrap();
    symlink(shared.path(), temp.path().join("linked")).unwrap();

    let entry = DirectoryClassPathEntry::new(temp.path());
    assert_eq!(
        paths_of(&entry, &everything()),
        vec!["linked/Shared.java", "own/Own.java"]
    );
}

#[test]
fn test_archive_entry_caches_results_per_prefix_set() {
    let cpe = TestClassPath::cpe1_as(BackingKind::Archive).unwrap();
    let entry = cpe.entry();

    let mut user = PathPrefixSet::new();
    user.add(prefix("com/google/gwt/user/client/"));
    let bar = {
        let mut set = PathPrefixSet::new();
        set.add(prefix("org/example/bar/client/"));
        set
    };

    let user1 = entry.find_applicable_resources(&TracingLogger, &user).unwrap();
    let bar1 = entry.find_applicable_resources(&TracingLogger, &bar).unwrap();
    let user2 = entry.find_applicable_resources(&TracingLogger, &user).unwrap();
    let bar2 = entry.find_applicable_resources(&TracingLogger, &bar).unwrap();
    assert!(Arc::ptr_eq(&user1, &user2));
    assert!(Arc::ptr_eq(&bar1, &bar2));
    assert_eq!(user1.len(), 3);
    assert_eq!(bar1.len(), 3);

    // Mutating the set invalidates only its own cache, but resources survive.
    user.add(prefix("com/google/gwt/user/"));
    let user3 = entry.find_applicable_resources(&TracingLogger, &user).unwrap();
    assert!(!Arc::ptr_eq(&user1, &user3));
    assert_eq!(user3.len(), 4);
    assert!(Arc::ptr_eq(
        &user1["com/google/gwt/user/client/Timer.java"].resource,
        &user3["com/google/gwt/user/client/Timer.java"].resource
    ));
    assert!(Arc::ptr_eq(
        &bar1,
        &entry.find_applicable_resources(&TracingLogger, &bar).unwrap()
    ));
}

#[test]
fn test_archive_entry_notices_rewritten_archive() {
    let temp = tempfile::tempdir().unwrap();
    let jar = temp.path().join("lib.jar");
    write_archive(&jar, &[("a/One.java".into(), "1".into())]).unwrap();
    let entry = ZipFileClassPathEntry::new(&jar);
    let prefixes = everything();

    let first = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(
        first["a/One.java"].resource.location(),
        format!("jar:file:{}!/a/One.java", jar.canonicalize().unwrap().display())
    );

    // Make sure the rewrite lands on a different mtime.
    std::thread::sleep(Duration::from_millis(1100));
    write_archive(
        &jar,
        &[
            ("a/One.java".into(), "1".into()),
            ("a/Two.java".into(), "2".into()),
            (".svn/entries".into(), "x".into()),
        ],
    )
    .unwrap();

    assert!(first["a/One.java"].resource.is_stale());
    let second = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    assert_eq!(second.keys().collect::<Vec<_>>(), vec!["a/One.java", "a/Two.java"]);
    assert_eq!(second["a/Two.java"].resource.read_bytes().unwrap(), b"2");
}

#[test]
fn test_missing_archive_contributes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let entry = ZipFileClassPathEntry::new(temp.path().join("gone.jar"));
    assert!(paths_of(&entry, &everything()).is_empty());
}

#[test]
fn test_corrupt_archive_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let jar = temp.path().join("broken.jar");
    std::fs::write(&jar, "not a zip").unwrap();
    let entry = ZipFileClassPathEntry::new(&jar);
    let err = entry
        .find_applicable_resources(&TracingLogger, &everything())
        .unwrap_err();
    assert!(matches!(err, OracleError::Archive { .. }));
}

#[test]
fn test_mock_entry_update_and_remove() {
    let entry = MockClassPathEntry::new("/mock/");
    let original = entry.add_resource_with_contents("a/Foo.java", "v1");
    assert!(!original.is_stale());

    let updated = entry.update_resource("a/Foo.java");
    assert!(!Arc::ptr_eq(&original, &updated));
    assert!(original.is_stale());
    assert!(original.open_contents().is_none());
    assert_eq!(updated.read_bytes().unwrap(), b"v1");

    assert!(entry.remove_resource("a/Foo.java"));
    assert!(!entry.remove_resource("a/Foo.java"));
    assert!(entry.is_empty());
    assert!(updated.is_stale());
}

#[test]
fn test_excluding_entry_hides_vcs_files_and_keeps_location() {
    for kind in BackingKind::ALL {
        let cpe = TestClassPath::build(
            kind,
            "vcs",
            &[
                "com/example/client/Foo.java",
                "com/example/client/CVS/Entries",
                "com/example/client/.cvsignore",
                "com/example/client/SCCS/s.Foo.java",
            ],
        )
        .unwrap();
        let delegate = cpe.entry();
        let excluding = ExcludingClassPathEntry::excluding_vcs(Arc::clone(&delegate));
        assert_eq!(excluding.location(), delegate.location());
        assert_eq!(
            format!("{}", &excluding as &dyn ClassPathEntry),
            delegate.location()
        );

        let mut prefixes = PathPrefixSet::new();
        prefixes.add(prefix("com/example/"));
        let all = paths_of(delegate.as_ref(), &prefixes);
        assert_eq!(all.len(), 4, "{kind:?}");
        assert_eq!(
            paths_of(&excluding, &prefixes),
            vec!["com/example/client/Foo.java"],
            "{kind:?}"
        );
    }
}

#[test]
fn test_excluding_entry_reuses_result_for_unchanged_delegate_result() {
    let cpe = TestClassPath::cpe1_as(BackingKind::Archive).unwrap();
    let excluding = ExcludingClassPathEntry::excluding_vcs(cpe.entry());
    let prefixes = client_prefixes();
    let first = excluding.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    let second = excluding.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_resolution_records_matching_prefix_per_entry() {
    let entry = MockClassPathEntry::new("/mock/");
    entry.add_resource("com/google/gwt/user/client/Command.java");
    let mut prefixes = PathPrefixSet::new();
    prefixes.add(PathPrefix::new("com/google/gwt/user/client/", None).for_module("User"));
    let found = entry.find_applicable_resources(&TracingLogger, &prefixes).unwrap();
    let resolution = &found["com/google/gwt/user/client/Command.java"].resolution;
    assert_eq!(resolution.path_prefix.prefix(), "com/google/gwt/user/client/");
    assert_eq!(resolution.path_prefix.module_name(), Some("User"));
}
