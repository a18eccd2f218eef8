mod common;

use std::collections::BTreeSet;

use classpath_oracle::resource::{PathPrefix, PathPrefixSet};
use common::{filter, java_only, prefix};
use proptest::prelude::*;

#[test]
fn test_client_prefixes_select_files_under_client_only() {
    let mut set = PathPrefixSet::new();
    set.add(prefix("com/google/gwt/user/client/"));
    set.add(prefix("com/google/gwt/i18n/client/"));

    let user = set
        .includes_resource("com/google/gwt/user/client/Command.java")
        .expect("Command.java should be included");
    assert_eq!(user.path_prefix.prefix(), "com/google/gwt/user/client/");

    assert!(set.includes_resource("com/google/gwt/user/client/Timer.java").is_some());
    assert!(set.includes_resource("com/google/gwt/user/client/ui/Widget.java").is_some());

    let i18n = set
        .includes_resource("com/google/gwt/i18n/client/Messages.java")
        .expect("Messages.java should be included");
    assert_eq!(i18n.path_prefix.prefix(), "com/google/gwt/i18n/client/");

    // One level above `client/`.
    assert!(set.includes_resource("com/google/gwt/user/User.gwt.xml").is_none());
    assert!(set.includes_resource("com/google/gwt/i18n/rebind/LocalizableGenerator.java").is_none());
}

#[test]
fn test_includes_directory_covers_ancestors_and_descendants() {
    let mut set = PathPrefixSet::new();
    set.add(prefix("com/google/gwt/user/client/"));

    assert!(set.includes_directory("com/"));
    assert!(set.includes_directory("com/google/gwt"));
    assert!(set.includes_directory("com/google/gwt/user/client/"));
    assert!(set.includes_directory("com/google/gwt/user/client/ui/"));

    assert!(!set.includes_directory("org/"));
    assert!(!set.includes_directory("com/google/gwt/i18n/"));
    assert!(!set.includes_directory("com/google/gwt/user/rebind/"));
}

#[test]
fn test_empty_set_includes_nothing() {
    let set = PathPrefixSet::new();
    assert!(set.is_empty());
    assert!(set.includes_resource("Foo.java").is_none());
    assert!(set.includes_resource("com/Foo.java").is_none());
    assert!(!set.includes_directory("com/"));
}

#[test]
fn test_zero_length_prefix_matches_everything() {
    let mut set = PathPrefixSet::new();
    set.add(prefix(""));
    assert!(set.includes_resource("Foo.java").is_some());
    assert!(set.includes_resource("a/b/c/Foo.java").is_some());
    assert!(set.includes_directory("anything/at/all"));
}

#[test]
fn test_longest_prefix_filter_is_exclusive() {
    let mut set = PathPrefixSet::new();
    set.add(prefix("com/google/"));
    set.add(PathPrefix::new("com/google/gwt/", java_only()));

    // The deeper prefix rejects it; the shallower one is not consulted.
    assert!(set.includes_resource("com/google/gwt/Foo.txt").is_none());

    let hit = set.includes_resource("com/google/gwt/Foo.java").unwrap();
    assert_eq!(hit.path_prefix.prefix(), "com/google/gwt/");

    let shallow = set.includes_resource("com/google/Foo.txt").unwrap();
    assert_eq!(shallow.path_prefix.prefix(), "com/google/");
}

#[test]
fn test_adding_same_textual_prefix_replaces_it() {
    let mut set = PathPrefixSet::new();
    assert!(!set.add(PathPrefix::new("com/google/", java_only())));
    assert!(set.includes_resource("com/google/Foo.txt").is_none());

    let first_priority = set.values().next().unwrap().priority();
    // Missing trailing slash is the same prefix.
    assert!(set.add(prefix("com/google")));
    assert_eq!(set.len(), 1);
    assert!(set.includes_resource("com/google/Foo.txt").is_some());
    assert!(set.values().next().unwrap().priority() > first_priority);
}

#[test]
fn test_version_tracks_mutation_and_clone_gets_new_id() {
    let mut set = PathPrefixSet::new();
    let v0 = set.version();
    set.add(prefix("a/"));
    assert!(set.version() > v0);

    let copy = set.clone();
    assert_ne!(copy.id(), set.id());
    assert!(copy.includes_resource("a/B.java").is_some());
}

#[test]
fn test_module_names_collected_from_every_accepting_prefix() {
    let mut set = PathPrefixSet::new();
    set.add(prefix("com/").for_module("A"));
    set.add(prefix("com/google/").for_module("B"));
    set.add(PathPrefix::new("com/google/gwt/", java_only()).for_module("C"));

    let java = set.includes_resource("com/google/gwt/Foo.java").unwrap();
    assert_eq!(java.path_prefix.module_name(), Some("C"));
    assert_eq!(
        java.module_names,
        BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string()])
    );

    let shallow = set.includes_resource("com/google/Bar.txt").unwrap();
    assert_eq!(
        shallow.module_names,
        BTreeSet::from(["A".to_string(), "B".to_string()])
    );
}

#[test]
fn test_rerooting_prefix_filters_the_rerooted_path() {
    let mut set = PathPrefixSet::new();
    set.add(PathPrefix::with_reroot(
        "com/google/gwt/super/",
        filter(|p| p.starts_with("java/")),
        true,
    ));

    let hit = set
        .includes_resource("com/google/gwt/super/java/lang/Object.java")
        .unwrap();
    assert!(hit.path_prefix.should_reroot());
    assert_eq!(
        hit.path_prefix
            .logical_path("com/google/gwt/super/java/lang/Object.java"),
        "java/lang/Object.java"
    );
    assert!(set.includes_resource("com/google/gwt/super/other/Foo.java").is_none());
}

#[test]
fn test_rerooted_prefix_preferred_over_plain() {
    let mut set = PathPrefixSet::new();
    set.add(PathPrefix::with_reroot("translatable/", None, true));
    set.add(prefix(""));

    let values: Vec<&PathPrefix> = set.values().collect();
    let (rerooted, plain) = (values[0], values[1]);
    assert!(plain.priority() > rerooted.priority());
    assert!(rerooted.is_preferred_over(plain));
    assert!(!plain.is_preferred_over(rerooted));
}

#[derive(Debug, Clone, Copy)]
enum FilterKind {
    None,
    JavaOnly,
    RejectAll,
}

impl FilterKind {
    fn accepts(self, path: &str) -> bool {
        match self {
            FilterKind::None => true,
            FilterKind::JavaOnly => path.ends_with(".java"),
            FilterKind::RejectAll => false,
        }
    }
}

fn to_prefix(path: &str, kind: FilterKind) -> PathPrefix {
    match kind {
        FilterKind::None => PathPrefix::new(path, None),
        FilterKind::JavaOnly => PathPrefix::new(path, java_only()),
        FilterKind::RejectAll => PathPrefix::new(path, filter(|_| false)),
    }
}

fn filter_kind() -> impl Strategy<Value = FilterKind> {
    prop_oneof![
        Just(FilterKind::None),
        Just(FilterKind::JavaOnly),
        Just(FilterKind::RejectAll),
    ]
}

fn dir_path() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 0..4).prop_map(|segs| {
        segs.iter().map(|s| format!("{s}/")).collect::<String>()
    })
}

fn resource_path() -> impl Strategy<Value = String> {
    (dir_path(), prop_oneof![Just("X.java"), Just("Y.txt")]).prop_map(|(dir, file)| format!("{dir}{file}"))
}

proptest! {
    #[test]
    fn prop_longest_prefix_decides_alone(
        prefixes in proptest::collection::vec((dir_path(), filter_kind()), 0..6),
        path in resource_path(),
    ) {
        let mut set = PathPrefixSet::new();
        // Last write wins for the same textual prefix.
        let mut model: Vec<(String, FilterKind)> = Vec::new();
        for (p, kind) in &prefixes {
            set.add(to_prefix(p, *kind));
            model.retain(|(existing, _)| existing != p);
            model.push((p.clone(), *kind));
        }

        let expected = model
            .iter()
            .filter(|(p, _)| path.starts_with(p.as_str()))
            .max_by_key(|(p, _)| p.len())
            .filter(|(_, kind)| kind.accepts(&path))
            .map(|(p, _)| p.clone());

        let actual = set
            .includes_resource(&path)
            .map(|r| r.path_prefix.prefix().to_string());
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_zero_length_prefix_with_filter_matches_iff_filter_accepts(
        kind in filter_kind(),
        path in resource_path(),
    ) {
        let mut set = PathPrefixSet::new();
        set.add(to_prefix("", kind));
        prop_assert_eq!(set.includes_resource(&path).is_some(), kind.accepts(&path));
    }

    #[test]
    fn prop_included_resources_live_in_included_directories(
        prefixes in proptest::collection::vec(dir_path(), 0..5),
        path in resource_path(),
    ) {
        let set: PathPrefixSet = prefixes.iter().map(|p| PathPrefix::new(p.as_str(), None)).collect();
        if set.includes_resource(&path).is_some() {
            let mut dir = String::new();
            for segment in path.split('/').collect::<Vec<_>>().split_last().unwrap().1 {
                dir.push_str(segment);
                dir.push('/');
                prop_assert!(set.includes_directory(&dir), "{} not included", dir);
            }
        }
    }
}
