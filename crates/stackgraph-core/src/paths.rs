//! Node identifiers: repo-relative directory paths with `/` separators.

use std::path::{Component, Path};

/// Lexically normalize a repo-relative path into a node id, resolving `.` and
/// `..`. Returns `None` for absolute paths or paths that climb above the root.
pub fn normalize(path: &Path) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

/// Node id of `path` relative to `root`, if `path` lies inside it.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    normalize(path.strip_prefix(root).ok()?)
}

/// Split a node id into its path segments.
pub fn segments(node: &str) -> impl Iterator<Item = &str> {
    node.split('/').filter(|s| !s.is_empty() && *s != ".")
}
