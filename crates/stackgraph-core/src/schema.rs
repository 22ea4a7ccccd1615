//! JSON graph dump: `{"nodes": [path, ...], "edges": {path: [path, ...]}}`.

use crate::graph::{DependencyGraph, GraphIssue};
use anyhow::{Context, Result};

/// Serialize a graph to a pretty-printed JSON dump.
pub fn to_json(graph: &DependencyGraph) -> Result<String> {
    serde_json::to_string_pretty(graph).context("failed to serialize graph to JSON")
}

/// Deserialize a graph dump, rebuilding the reverse adjacency.
/// Rejects dumps whose edges reference nodes outside the node list.
pub fn from_json(json: &str) -> Result<DependencyGraph> {
    let mut graph: DependencyGraph =
        serde_json::from_str(json).context("failed to deserialize graph from JSON")?;
    graph.rebuild_reverse();

    let dangling: Vec<String> = graph
        .validate()
        .iter()
        .filter(|issue| matches!(issue, GraphIssue::DanglingEndpoint { .. }))
        .map(ToString::to_string)
        .collect();
    if !dangling.is_empty() {
        anyhow::bail!("graph dump is inconsistent: {}", dangling.join("; "));
    }
    Ok(graph)
}
