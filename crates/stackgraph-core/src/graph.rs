//! Directory dependency graph: nodes are repo-relative directory paths, an edge
//! `A → B` means "A reads from B".

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Errors from graph mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("edge {from} -> {to} references unknown node {missing}")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },
}

/// The dependency graph over configuration directories.
///
/// `edges` is the forward adjacency (dependent → dependencies); `reverse` is
/// derived from it and never serialized. Every mutation keeps both in step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<String, BTreeSet<String>>,
    #[serde(skip)]
    reverse: BTreeMap<String, BTreeSet<String>>,
}

/// An integrity problem found by [`DependencyGraph::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// An edge endpoint is missing from the node set.
    DanglingEndpoint { from: String, to: String },
    /// `to` is in `from`'s forward set but `from` is not in `to`'s reverse set.
    MissingReverse { from: String, to: String },
    /// `from` is in `to`'s reverse set but `to` is not in `from`'s forward set.
    MissingForward { from: String, to: String },
}

impl std::fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingEndpoint { from, to } => {
                write!(f, "dangling edge: {} -> {}", from, to)
            }
            Self::MissingReverse { from, to } => {
                write!(f, "edge {} -> {} has no reverse entry", from, to)
            }
            Self::MissingForward { from, to } => {
                write!(f, "reverse entry {} <- {} has no forward edge", to, from)
            }
        }
    }
}

static EMPTY: BTreeSet<String> = BTreeSet::new();

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns false if it was already present.
    pub fn add_node(&mut self, node: impl Into<String>) -> bool {
        self.nodes.insert(node.into())
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    /// Record `from → to` in both adjacency maps. Both endpoints must already
    /// be nodes. Returns `Ok(false)` if the edge already existed.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<bool, GraphError> {
        for endpoint in [from, to] {
            if !self.nodes.contains(endpoint) {
                return Err(GraphError::UnknownNode {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        let inserted = self
            .edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
        Ok(inserted)
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    /// Forward adjacency: dependent → dependencies. Nodes without outgoing
    /// edges have no entry.
    pub fn edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }

    /// Reverse adjacency: dependency → dependents.
    pub fn reverse_edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.reverse
    }

    /// Directories `node` reads from.
    pub fn dependencies(&self, node: &str) -> &BTreeSet<String> {
        self.edges.get(node).unwrap_or(&EMPTY)
    }

    /// Directories that read from `node`.
    pub fn dependents(&self, node: &str) -> &BTreeSet<String> {
        self.reverse.get(node).unwrap_or(&EMPTY)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Rebuild the reverse adjacency from the forward one.
    /// Needed after deserialization, since `reverse` is not persisted.
    pub fn rebuild_reverse(&mut self) {
        self.reverse.clear();
        for (from, targets) in &self.edges {
            for to in targets {
                self.reverse
                    .entry(to.clone())
                    .or_default()
                    .insert(from.clone());
            }
        }
    }

    /// Check that every edge endpoint is a node and that the forward and
    /// reverse maps mirror each other exactly.
    pub fn validate(&self) -> Vec<GraphIssue> {
        let mut issues = Vec::new();
        for (from, targets) in &self.edges {
            for to in targets {
                if !self.nodes.contains(from) || !self.nodes.contains(to) {
                    issues.push(GraphIssue::DanglingEndpoint {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                if !self.dependents(to).contains(from) {
                    issues.push(GraphIssue::MissingReverse {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }
        for (to, sources) in &self.reverse {
            for from in sources {
                if !self.dependencies(from).contains(to) {
                    issues.push(GraphIssue::MissingForward {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }
        issues
    }
}
