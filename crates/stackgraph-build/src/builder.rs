//! Dependency graph construction.
//!
//! An edge `A → B` means A reads from B, either through a local module call or
//! a `terraform_remote_state` data source whose backend coordinate B owns.

use crate::backend::BackendIndex;
use crate::discovery;
use crate::inspect::{Introspector, ModuleReport, SourcePos};
use anyhow::Result;
use stackgraph_core::config::StackgraphConfig;
use stackgraph_core::graph::DependencyGraph;
use stackgraph_core::paths;
use stackgraph_parser::extract::remote_state_config;
use stackgraph_parser::files;
use stackgraph_parser::vars::{VariableMap, resolve_variables};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Counters from one build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub discovered: usize,
    /// Nodes added because a dependency resolved outside the discovered set.
    pub added_lazily: usize,
    pub inspected: usize,
    /// Directories whose introspection failed and contributed no edges.
    pub failed_inspections: usize,
    pub edges: usize,
}

/// A finished graph together with the backend index it was linked against.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: DependencyGraph,
    pub backends: BackendIndex,
    pub stats: BuildStats,
}

/// Builds the dependency graph for one repository.
pub struct GraphBuilder<I> {
    repo_root: PathBuf,
    config: StackgraphConfig,
    introspector: I,
}

impl<I: Introspector> GraphBuilder<I> {
    pub fn new(repo_root: &Path, config: StackgraphConfig, introspector: I) -> Self {
        // Absolute module sources are compared against the canonical root.
        let repo_root = repo_root
            .canonicalize()
            .unwrap_or_else(|_| repo_root.to_path_buf());
        Self {
            repo_root,
            config,
            introspector,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Discover nodes, index backends, then link every node to its dependencies.
    ///
    /// Nodes created for out-of-tree dependencies are inspected as well, so
    /// their own dependencies are linked too. Only discovery errors (invalid
    /// exclude globs) are returned; per-directory failures are logged.
    pub fn build(&self) -> Result<BuiltGraph> {
        let discovered = discovery::discover_nodes(&self.repo_root, &self.config.layout)?;
        let backends = BackendIndex::build(&self.repo_root, &discovered, &self.config.backend.kind);

        let mut graph = DependencyGraph::new();
        for node in &discovered {
            graph.add_node(node.clone());
        }
        let mut stats = BuildStats {
            discovered: discovered.len(),
            ..BuildStats::default()
        };

        let mut queue: VecDeque<String> = discovered.into_iter().collect();
        while let Some(node) = queue.pop_front() {
            stats.inspected += 1;
            let Some(deps) = self.resolve_dependencies(&node, &backends) else {
                stats.failed_inspections += 1;
                continue;
            };
            for dep in deps {
                if dep == node {
                    continue;
                }
                if !graph.contains(&dep) {
                    if !self.repo_root.join(&dep).is_dir() {
                        tracing::debug!("{} depends on missing directory {}", node, dep);
                        continue;
                    }
                    graph.add_node(dep.clone());
                    stats.added_lazily += 1;
                    queue.push_back(dep.clone());
                }
                if let Err(e) = graph.add_edge(&node, &dep) {
                    tracing::warn!("{}", e);
                }
            }
        }

        stats.edges = graph.edge_count();
        tracing::info!(
            "graph built: {} nodes, {} edges, {} failed inspections",
            graph.node_count(),
            stats.edges,
            stats.failed_inspections
        );
        Ok(BuiltGraph {
            graph,
            backends,
            stats,
        })
    }

    /// Dependencies of one directory, as node ids. `None` when introspection
    /// failed; the directory then contributes no edges.
    pub fn resolve_dependencies(
        &self,
        node: &str,
        backends: &BackendIndex,
    ) -> Option<BTreeSet<String>> {
        let dir = self.repo_root.join(node);
        if !dir.is_dir() {
            return Some(BTreeSet::new());
        }

        let report = match self.introspector.inspect(Path::new(node)) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("no dependencies for {}: {}", node, e);
                return None;
            }
        };

        let mut deps: BTreeSet<String> = report
            .module_calls
            .values()
            .filter_map(|call| self.resolve_module_source(node, &call.source))
            .collect();
        deps.extend(self.resolve_remote_states(node, &dir, &report, backends));
        Some(deps)
    }

    /// Node id for a local module source, or `None` for registry/VCS sources
    /// and paths outside the repository.
    pub fn resolve_module_source(&self, node: &str, source: &str) -> Option<String> {
        if source.starts_with("./")
            || source.starts_with("../")
            || source == "."
            || source == ".."
        {
            let resolved = paths::normalize(&Path::new(node).join(source));
            if resolved.is_none() {
                tracing::debug!("module source {} from {} leaves the repository", source, node);
            }
            return resolved;
        }
        let path = Path::new(source);
        if path.is_absolute() {
            return paths::relative_to(&self.repo_root, path);
        }
        None
    }

    fn resolve_remote_states(
        &self,
        node: &str,
        dir: &Path,
        report: &ModuleReport,
        backends: &BackendIndex,
    ) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        let mut vars: Option<VariableMap> = None;
        let no_vars = VariableMap::new();

        for (key, pos) in report.remote_states() {
            let Some(file) = self.locate_source(node, pos) else {
                tracing::debug!("{}: source file {} not found", key, pos.filename);
                continue;
            };
            let source = match files::read_source(&file) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("{}", e);
                    continue;
                }
            };
            let remote = match remote_state_config(&source, pos.line) {
                Ok(Some(remote)) => remote,
                Ok(None) => {
                    tracing::debug!("{} in {}: no bucket/prefix config", key, node);
                    continue;
                }
                Err(e) => {
                    tracing::debug!("{} in {}: {}", key, node, e);
                    continue;
                }
            };
            let scope = if remote.needs_variables() {
                &*vars.get_or_insert_with(|| resolve_variables(dir))
            } else {
                &no_vars
            };
            let Some(coordinate) = remote.resolve(scope) else {
                tracing::debug!("{} in {}: coordinate not resolvable", key, node);
                continue;
            };
            match backends.lookup(&coordinate) {
                Some(owner) => {
                    deps.insert(owner.to_string());
                }
                None => tracing::debug!(
                    "{} in {}: backend {} is not owned by any stack",
                    key,
                    node,
                    coordinate
                ),
            }
        }
        deps
    }

    /// Find the file a position refers to. The tool reports paths relative to
    /// its working directory (the repository root), but bare file names and
    /// absolute paths are accepted too.
    fn locate_source(&self, node: &str, pos: &SourcePos) -> Option<PathBuf> {
        let reported = Path::new(&pos.filename);
        if reported.is_absolute() {
            return reported.is_file().then(|| reported.to_path_buf());
        }
        [
            self.repo_root.join(reported),
            self.repo_root.join(node).join(reported),
        ]
        .into_iter()
        .find(|candidate| candidate.is_file())
    }
}
