mod common;

use classpath_oracle::OracleError;
use classpath_oracle::config::{from_toml_str, load_and_validate, load_from_path};
use classpath_oracle::filters::{GlobFilter, is_default_excluded};
use classpath_oracle::resource::ResourceFilter;
use classpath_oracle::{PrefixChangeManager, Resource, TracingLogger, WatchRegistry};
use classpath_oracle_test_utils::fixtures::{write_archive, write_file};
use common::{init_tracing, published_paths};

#[test]
fn test_default_excludes() {
    for excluded in [
        "CVS/Entries",
        "com/example/CVS/Root",
        "com/example/.svn/entries",
        "SCCS/s.Foo.java",
        "com/.git/HEAD",
        "com/.hg/store",
        "com/example/.cvsignore",
        "vssver.scc",
        "com/example/.DS_Store",
    ] {
        assert!(is_default_excluded(excluded), "{excluded} should be excluded");
    }
    for kept in [
        "com/example/Foo.java",
        "com/example/CVSHelper.java",
        "com/example/cvsignore.txt",
        "com/example/.svnrc/Foo.java",
    ] {
        assert!(!is_default_excluded(kept), "{kept} should be kept");
    }
}

#[test]
fn test_glob_filter_includes_and_excludes() {
    let filter = GlobFilter::builder()
        .include("**/*.java")
        .exclude("**/impl/**")
        .build()
        .unwrap();
    assert!(filter.allows("Foo.java"));
    assert!(filter.allows("com/example/Foo.java"));
    assert!(!filter.allows("com/example/Foo.txt"));
    assert!(!filter.allows("com/example/impl/FooImpl.java"));
}

#[test]
fn test_single_star_stays_within_a_directory() {
    let filter = GlobFilter::builder().include("*.java").build().unwrap();
    assert!(filter.allows("Foo.java"));
    assert!(!filter.allows("com/Foo.java"));
}

#[test]
fn test_trailing_slash_pattern_matches_whole_directory() {
    let filter = GlobFilter::builder().exclude("gen/").build().unwrap();
    assert!(!filter.allows("gen/A.java"));
    assert!(!filter.allows("gen/deep/B.java"));
    assert!(filter.allows("general/A.java"));
    assert!(filter.allows("src/gen.java"));
}

#[test]
fn test_java_only_and_default_excludes() {
    let filter = GlobFilter::builder()
        .java_only(true)
        .default_excludes(true)
        .build()
        .unwrap();
    assert!(filter.allows("com/Foo.java"));
    assert!(!filter.allows("com/Foo.class"));
    assert!(!filter.allows("com/CVS/Foo.java"));

    let defaults = GlobFilter::default_excludes_only();
    assert!(defaults.allows("com/Foo.properties"));
    assert!(!defaults.allows("com/.DS_Store"));
}

#[test]
fn test_invalid_glob_is_rejected() {
    let err = GlobFilter::builder().include("a/[b").build().unwrap_err();
    assert!(matches!(err, OracleError::InvalidPattern(_)), "{err:?}");
}

#[test]
fn test_parse_full_config() {
    let config = from_toml_str(
        r#"
classpath = ["src", "lib/gwt-user.jar"]

[options]
exclude_vcs = false
watch_directories = true

[[prefix]]
path = "com/google/gwt/user/client/"
module = "com.google.gwt.user.User"
include = ["**/*.java"]
exclude = ["**/impl/**"]

[[prefix]]
path = "com/google/gwt/emul/"
reroot = true
java_only = true
"#,
    )
    .unwrap();

    assert!(!config.options.exclude_vcs);
    assert!(config.options.watch_directories);
    assert_eq!(config.prefixes.len(), 2);
    assert_eq!(config.prefixes[0].module.as_deref(), Some("com.google.gwt.user.User"));
    assert!(config.prefixes[0].default_excludes);
    assert!(config.prefixes[1].reroot);

    let set = config.path_prefix_set().unwrap();
    assert_eq!(set.len(), 2);
    let hit = set
        .includes_resource("com/google/gwt/user/client/Timer.java")
        .unwrap();
    assert_eq!(hit.path_prefix.module_name(), Some("com.google.gwt.user.User"));
    assert!(set.includes_resource("com/google/gwt/user/client/impl/TimerImpl.java").is_none());
    assert!(set.includes_resource("com/google/gwt/user/client/Timer.txt").is_none());

    let emul = set.includes_resource("com/google/gwt/emul/java/lang/Object.java").unwrap();
    assert!(emul.path_prefix.should_reroot());
}

#[test]
fn test_defaults_apply_when_sections_are_missing() {
    let config = from_toml_str(r#"classpath = ["cp"]"#).unwrap();
    assert!(config.options.exclude_vcs);
    assert!(!config.options.watch_directories);
    assert!(config.prefixes.is_empty());
    assert!(config.path_prefix_set().unwrap().is_empty());
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = from_toml_str(
        r#"
classpath = ["cp"]
[options]
exclude_cvs = true
"#,
    )
    .unwrap_err();
    assert!(matches!(err, OracleError::TomlError(_)), "{err:?}");
}

#[test]
fn test_validation_errors() {
    let cases = [
        ("", "at least one"),
        ("classpath = [\"cp\"]\n[[prefix]]\npath = \"/abs/\"", "must be relative"),
        ("classpath = [\"cp\"]\n[[prefix]]\npath = \"a/../b/\"", "'..'"),
        (
            "classpath = [\"cp\"]\n[[prefix]]\npath = \"a/\"\n[[prefix]]\npath = \"a\"",
            "more than once",
        ),
        (
            "classpath = [\"cp\"]\n[[prefix]]\npath = \"a/\"\ninclude = [\"[\"]",
            "prefix 'a/'",
        ),
    ];
    for (toml, expected) in cases {
        match from_toml_str(toml) {
            Err(OracleError::ConfigError(message)) => {
                assert!(message.contains(expected), "{message:?} lacks {expected:?}")
            }
            other => panic!("expected a config error for {toml:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_load_from_path_skips_validation() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_file(temp.path(), "oracle.toml", "[options]\nexclude_vcs = false\n").unwrap();
    let raw = load_from_path(&path).unwrap();
    assert!(raw.classpath.is_empty());
    assert!(load_and_validate(&path).is_err());
}

#[test]
fn test_loaded_config_builds_working_oracle() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    write_file(temp.path(), "cp/com/example/client/Foo.java", "dir").unwrap();
    write_file(temp.path(), "cp/com/example/client/CVS/Entries", "").unwrap();
    write_file(temp.path(), "cp/com/example/client/notes.txt", "").unwrap();
    write_archive(
        &temp.path().join("lib.jar"),
        &[
            ("com/example/client/Foo.java".into(), "jar".into()),
            ("com/example/client/Bar.java".into(), "jar".into()),
        ],
    )
    .unwrap();
    let config_path = write_file(
        temp.path(),
        "oracle.toml",
        r#"
classpath = ["cp", "lib.jar", "missing"]

[[prefix]]
path = "com/example/client/"
module = "com.example.Example"
default_excludes = false
"#,
    )
    .unwrap();

    let config = load_and_validate(&config_path).unwrap();
    assert_eq!(config.base_dir(), temp.path());
    assert_eq!(config.resolved_classpath()[1], temp.path().join("lib.jar"));

    let registry = WatchRegistry::new();
    let manager = PrefixChangeManager::new();
    let mut oracle = config.build_oracle(&registry, &manager).unwrap();
    assert_eq!(oracle.class_path().len(), 3);
    assert!(oracle.refresh(&TracingLogger).unwrap());

    // The prefix keeps CVS/ visible, the entry wrapper still hides it.
    assert_eq!(
        published_paths(&oracle),
        vec![
            "com/example/client/Bar.java",
            "com/example/client/Foo.java",
            "com/example/client/notes.txt",
        ]
    );
    let foo = oracle.get_resource("com/example/client/Foo.java").unwrap();
    assert_eq!(foo.read_bytes().unwrap(), b"dir");
    assert!(foo.location().starts_with("file:"));
    assert_eq!(
        oracle
            .resolution("com/example/client/Bar.java")
            .unwrap()
            .path_prefix
            .module_name(),
        Some("com.example.Example")
    );
}

#[test]
fn test_watched_config_registers_live_directories() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    write_file(temp.path(), "cp/a/One.java", "").unwrap();
    let config_path = write_file(
        temp.path(),
        "oracle.toml",
        "classpath = [\"cp\"]\n[options]\nwatch_directories = true\n[[prefix]]\npath = \"a/\"\n",
    )
    .unwrap();

    let config = load_and_validate(&config_path).unwrap();
    let registry = WatchRegistry::new();
    let manager = PrefixChangeManager::new();
    let mut oracle = config.build_oracle(&registry, &manager).unwrap();
    oracle.refresh(&TracingLogger).unwrap();

    assert_eq!(published_paths(&oracle), vec!["a/One.java"]);
    assert_eq!(manager.registration_count(), 1);
    assert_eq!(registry.active_roots(), 1);
}

#[test]
fn test_log_level_parsing() {
    use classpath_oracle::logging::LogLevel;

    assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    assert_eq!(" WARNING ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!(tracing::Level::from(LogLevel::Trace), tracing::Level::TRACE);
    assert!("loud".parse::<LogLevel>().is_err());
}
