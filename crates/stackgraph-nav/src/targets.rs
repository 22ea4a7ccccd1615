//! Runnable targets: deployable root stacks under the environment subtree.

use crate::changes::collect_changed_files;
use crate::impact::compute_impact;
use serde::Serialize;
use stackgraph_core::config::LayoutConfig;
use stackgraph_core::graph::DependencyGraph;
use stackgraph_core::paths;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One entry of the CI job matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub dir: String,
    pub env: String,
}

/// How a target list is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutput {
    /// Pretty JSON array of directories.
    List,
    /// Compact JSON array of `{dir, env}` objects.
    Matrix,
}

/// Which stacks to run. `all` wins over `targets`, which wins over the
/// changed files; `env` narrows whatever was selected.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub all: bool,
    pub targets: Vec<String>,
    pub changed_list: Option<PathBuf>,
    pub files: Vec<String>,
    pub env: Option<String>,
}

/// Structural predicate deciding which nodes are independently deployable.
///
/// A node is runnable when it lies under `<terraform_root>/<env_dir>/`, none
/// of its path segments equals `modules_dir`, and it contains `backend_file`.
#[derive(Debug, Clone)]
pub struct TargetFilter {
    repo_root: PathBuf,
    layout: LayoutConfig,
    env_root: Vec<String>,
}

impl TargetFilter {
    pub fn new(repo_root: impl Into<PathBuf>, layout: LayoutConfig) -> Self {
        let env_root = paths::segments(&layout.env_root())
            .map(str::to_string)
            .collect();
        Self {
            repo_root: repo_root.into(),
            layout,
            env_root,
        }
    }

    /// Segments of `node` below the environment subtree, if it lies under it.
    fn env_relative<'a>(&self, node: &'a str) -> Option<Vec<&'a str>> {
        let segments: Vec<&str> = paths::segments(node).collect();
        if segments.len() <= self.env_root.len() {
            return None;
        }
        let under = self
            .env_root
            .iter()
            .zip(&segments)
            .all(|(root, seg)| root.as_str() == *seg);
        under.then(|| segments[self.env_root.len()..].to_vec())
    }

    pub fn is_runnable(&self, node: &str) -> bool {
        if self.env_relative(node).is_none() {
            return false;
        }
        if paths::segments(node).any(|seg| seg == self.layout.modules_dir) {
            return false;
        }
        self.repo_root
            .join(node)
            .join(&self.layout.backend_file)
            .is_file()
    }

    /// Runnable nodes among `candidates`, normalized, in input order without
    /// duplicates.
    pub fn filter<S: AsRef<str>>(&self, candidates: impl IntoIterator<Item = S>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for candidate in candidates {
            let Some(node) = paths::normalize(Path::new(candidate.as_ref().trim())) else {
                tracing::debug!("ignoring target outside the repository: {}", candidate.as_ref());
                continue;
            };
            if !self.is_runnable(&node) {
                tracing::debug!("{} is not a runnable stack", node);
                continue;
            }
            if seen.insert(node.clone()) {
                targets.push(node);
            }
        }
        targets
    }

    /// Environment name of a node: the segment right after the environment
    /// subtree designator.
    pub fn env_name<'a>(&self, node: &'a str) -> Option<&'a str> {
        self.env_relative(node)?.first().copied()
    }

    /// Keep only targets whose environment name is exactly `env`.
    pub fn filter_env(&self, targets: Vec<String>, env: &str) -> Vec<String> {
        targets
            .into_iter()
            .filter(|t| self.env_name(t) == Some(env))
            .collect()
    }

    /// Matrix entries for targets that have an environment name.
    pub fn matrix(&self, targets: &[String]) -> Vec<MatrixEntry> {
        targets
            .iter()
            .filter_map(|t| {
                self.env_name(t).map(|env| MatrixEntry {
                    dir: t.clone(),
                    env: env.to_string(),
                })
            })
            .collect()
    }

    pub fn render(&self, targets: &[String], output: TargetOutput) -> serde_json::Result<String> {
        match output {
            TargetOutput::List => serde_json::to_string_pretty(targets),
            TargetOutput::Matrix => serde_json::to_string(&self.matrix(targets)),
        }
    }
}

/// Resolve a selection against the graph into runnable targets.
///
/// An unreadable changed-file list is logged and the direct `files` are
/// still used.
pub fn select(graph: &DependencyGraph, filter: &TargetFilter, selection: &Selection) -> Vec<String> {
    let targets = if selection.all {
        filter.filter(graph.nodes())
    } else if !selection.targets.is_empty() {
        filter.filter(&selection.targets)
    } else {
        let changes = collect_changed_files(selection.changed_list.as_deref(), &selection.files);
        if let Some(e) = &changes.read_error {
            tracing::error!("Error reading changed files: {:#}", e);
        }
        if changes.files.is_empty() {
            Vec::new()
        } else {
            filter.filter(compute_impact(graph, &changes.files).nodes())
        }
    };

    match &selection.env {
        Some(env) => filter.filter_env(targets, env),
        None => targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            terraform_root: "tf".to_string(),
            ..LayoutConfig::default()
        }
    }

    fn stack(root: &Path, dir: &str, backend: bool) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("main.tf"), "").unwrap();
        if backend {
            fs::write(path.join("backend.tf"), "").unwrap();
        }
    }

    #[test]
    fn test_runnable_predicate() {
        let tmp = tempfile::tempdir().unwrap();
        stack(tmp.path(), "tf/env/dev/app", true);
        stack(tmp.path(), "tf/env/dev/lib", false);
        stack(tmp.path(), "tf/env/dev/modules/x", true);
        stack(tmp.path(), "tf/env/dev/k8s-modules-app", true);
        stack(tmp.path(), "tf/other/dev/app", true);
        stack(tmp.path(), "tf/environment/dev", true);
        let filter = TargetFilter::new(tmp.path(), layout());

        assert!(filter.is_runnable("tf/env/dev/app"));
        assert!(filter.is_runnable("tf/env/dev/k8s-modules-app"));
        assert!(!filter.is_runnable("tf/env/dev/lib"));
        assert!(!filter.is_runnable("tf/env/dev/modules/x"));
        assert!(!filter.is_runnable("tf/other/dev/app"));
        assert!(!filter.is_runnable("tf/environment/dev"));
        assert!(!filter.is_runnable("tf/env"));
    }

    #[test]
    fn test_filter_normalizes_and_dedups() {
        let tmp = tempfile::tempdir().unwrap();
        stack(tmp.path(), "tf/env/prod/app", true);
        stack(tmp.path(), "tf/env/dev/app", true);
        let filter = TargetFilter::new(tmp.path(), layout());

        let targets = filter.filter([
            "./tf/env/prod/app/",
            "tf/env/dev/app",
            "tf/env/prod/app",
            "../escape",
            "tf/env/qa/missing",
        ]);
        assert_eq!(targets, vec!["tf/env/prod/app", "tf/env/dev/app"]);
    }

    #[test]
    fn test_env_name_and_matrix() {
        let filter = TargetFilter::new("/nonexistent", layout());
        assert_eq!(filter.env_name("tf/env/prod-eu/app"), Some("prod-eu"));
        assert_eq!(filter.env_name("tf/modules/vpc"), None);

        let targets = vec!["tf/env/dev/app".to_string(), "tf/env/prod/app".to_string()];
        let json = serde_json::to_string(&filter.matrix(&targets)).unwrap();
        assert_eq!(
            json,
            r#"[{"dir":"tf/env/dev/app","env":"dev"},{"dir":"tf/env/prod/app","env":"prod"}]"#
        );
        assert_eq!(filter.filter_env(targets, "prod"), vec!["tf/env/prod/app"]);
    }

    #[test]
    fn test_repo_root_as_terraform_root() {
        let layout = LayoutConfig {
            terraform_root: ".".to_string(),
            ..LayoutConfig::default()
        };
        let filter = TargetFilter::new("/nonexistent", layout);
        assert_eq!(filter.env_name("env/dev/app"), Some("dev"));
        assert_eq!(filter.env_name("modules/env"), None);
    }
}
