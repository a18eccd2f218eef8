#![allow(dead_code)]

use std::sync::Arc;

use classpath_oracle::resource::{PathPrefix, ResourceFilter};
use classpath_oracle::{ResourceOracle, TracingLogger};

pub use classpath_oracle_test_utils::init_tracing;

/// Logical paths currently published by `oracle`.
pub fn published_paths(oracle: &ResourceOracle) -> Vec<String> {
    oracle.path_names().iter().cloned().collect()
}

/// Refresh with the tracing-backed logger, panicking on error.
pub fn refresh(oracle: &mut ResourceOracle) -> bool {
    oracle.refresh(&TracingLogger).expect("refresh failed")
}

pub fn filter(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Option<Arc<dyn ResourceFilter>> {
    let f: Arc<dyn ResourceFilter> = Arc::new(f);
    Some(f)
}

pub fn java_only() -> Option<Arc<dyn ResourceFilter>> {
    filter(|p| p.ends_with(".java"))
}

pub fn prefix(path: &str) -> PathPrefix {
    PathPrefix::new(path, None)
}
