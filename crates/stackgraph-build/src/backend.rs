//! Backend index: reverse lookup from a state coordinate to the directory that
//! owns it.

use stackgraph_parser::BackendCoordinate;
use stackgraph_parser::extract::backend_coordinate;
use stackgraph_parser::files;
use std::collections::BTreeMap;
use std::path::Path;

/// Two directories declaring the same backend coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConflict {
    pub coordinate: BackendCoordinate,
    /// The directory the index resolves the coordinate to.
    pub kept: String,
    pub ignored: String,
}

/// Coordinate → owning directory.
///
/// Directories are indexed in sorted order and the first claimant of a
/// coordinate keeps it; later claimants are recorded as conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendIndex {
    owners: BTreeMap<BackendCoordinate, String>,
    conflicts: Vec<BackendConflict>,
}

impl BackendIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every node directory under `repo_root` for a backend of type `kind`.
    /// Nodes without a backend (typically reusable modules) are left out.
    pub fn build<'a>(
        repo_root: &Path,
        nodes: impl IntoIterator<Item = &'a String>,
        kind: &str,
    ) -> Self {
        let mut sorted: Vec<&String> = nodes.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut index = Self::new();
        for node in sorted {
            if let Some(coordinate) = scan_backend(&repo_root.join(node), kind) {
                index.insert(coordinate, node);
            }
        }
        tracing::info!(
            "indexed {} backend coordinates ({} conflicts)",
            index.len(),
            index.conflicts.len()
        );
        index
    }

    /// Claim `coordinate` for `node`. Returns false (and records a conflict)
    /// if another directory already owns it.
    pub fn insert(&mut self, coordinate: BackendCoordinate, node: &str) -> bool {
        match self.owners.get(&coordinate) {
            Some(owner) if owner == node => true,
            Some(owner) => {
                tracing::warn!(
                    "backend {} declared by both {} and {}; keeping {}",
                    coordinate,
                    owner,
                    node,
                    owner
                );
                self.conflicts.push(BackendConflict {
                    coordinate,
                    kept: owner.clone(),
                    ignored: node.to_string(),
                });
                false
            }
            None => {
                self.owners.insert(coordinate, node.to_string());
                true
            }
        }
    }

    pub fn lookup(&self, coordinate: &BackendCoordinate) -> Option<&str> {
        self.owners.get(coordinate).map(String::as_str)
    }

    pub fn conflicts(&self) -> &[BackendConflict] {
        &self.conflicts
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendCoordinate, &str)> {
        self.owners.iter().map(|(c, n)| (c, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Backend coordinate declared by the first `*.tf` file in `dir` (name order)
/// that has one.
pub fn scan_backend(dir: &Path, kind: &str) -> Option<BackendCoordinate> {
    for file in files::declaration_files(dir) {
        let source = match files::read_source(&file) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("{}", e);
                continue;
            }
        };
        match backend_coordinate(&source, kind) {
            Ok(Some(coordinate)) => return Some(coordinate),
            Ok(None) => {}
            Err(e) => tracing::debug!("backend scan of {}: {}", file.display(), e),
        }
    }
    None
}
