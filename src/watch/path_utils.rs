// src/watch/path_utils.rs

//! Mapping watched filesystem paths onto resource paths.

use std::path::Path;

/// `path` relative to `root`, `/`-separated.
///
/// Tries a plain `strip_prefix` first; if that fails (symlinks, `/private`
/// aliases on macOS) both sides are canonicalized and compared again.
/// Returns `None` for paths outside `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_resource_path(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_resource_path(rel));
        }
    }

    None
}

fn to_resource_path(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
