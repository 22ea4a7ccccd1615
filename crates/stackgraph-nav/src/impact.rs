//! Impact analysis: BFS over reverse edges from the directories that changed.

use serde::Serialize;
use stackgraph_core::graph::DependencyGraph;
use stackgraph_core::paths;
use stackgraph_parser::files;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// The affected set for one change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactResult {
    /// Nodes that directly contain a changed file.
    pub seeds: BTreeSet<String>,
    /// Every affected node with its distance from the nearest seed (0 for seeds).
    pub affected: BTreeMap<String, usize>,
}

impl ImpactResult {
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.affected.keys().map(String::as_str)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.affected.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.affected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }
}

/// The node a changed file belongs to, if any.
///
/// Only declaration (`.tf`) and override (`.tfvars`) files count, and only
/// when their parent directory is a node. The file need not exist: a deleted
/// file still changes its directory.
pub fn seed_node(graph: &DependencyGraph, changed: &str) -> Option<String> {
    let path = Path::new(changed.trim());
    if !files::is_config_file(path) {
        return None;
    }
    let parent = paths::normalize(path.parent()?)?;
    graph.contains(&parent).then_some(parent)
}

/// Seed nodes for a batch of changed files. Unmapped files are skipped.
pub fn seed_nodes<S: AsRef<str>>(
    graph: &DependencyGraph,
    changed: impl IntoIterator<Item = S>,
) -> BTreeSet<String> {
    changed
        .into_iter()
        .filter_map(|file| {
            let seed = seed_node(graph, file.as_ref());
            if seed.is_none() {
                tracing::debug!("changed file {} maps to no node", file.as_ref());
            }
            seed
        })
        .collect()
}

/// Closure of `seeds` under "is a dependent of", with BFS depths.
pub fn affected_by(graph: &DependencyGraph, seeds: &BTreeSet<String>) -> BTreeMap<String, usize> {
    let mut affected: BTreeMap<String, usize> = BTreeMap::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    for seed in seeds {
        affected.insert(seed.clone(), 0);
        queue.push_back((seed.clone(), 0));
    }

    while let Some((current, depth)) = queue.pop_front() {
        for consumer in graph.dependents(&current) {
            if affected.contains_key(consumer) {
                continue;
            }
            affected.insert(consumer.clone(), depth + 1);
            queue.push_back((consumer.clone(), depth + 1));
        }
    }
    affected
}

/// Map changed files to seed nodes and compute everything affected by them.
pub fn compute_impact<S: AsRef<str>>(
    graph: &DependencyGraph,
    changed: impl IntoIterator<Item = S>,
) -> ImpactResult {
    let seeds = seed_nodes(graph, changed);
    let affected = affected_by(graph, &seeds);
    tracing::info!(
        "{} seed nodes, {} affected nodes",
        seeds.len(),
        affected.len()
    );
    ImpactResult { seeds, affected }
}
