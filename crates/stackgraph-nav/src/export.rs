//! Export the dependency graph as DOT (Graphviz) or Mermaid flowchart.

use stackgraph_core::graph::DependencyGraph;
use std::fmt::Write;

/// Export format for graph visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Dot,
    Mermaid,
}

/// Nodes other stacks depend on get a distinct style.
fn is_shared(graph: &DependencyGraph, node: &str) -> bool {
    !graph.dependents(node).is_empty()
}

/// Export the graph as a DOT (Graphviz) string.
pub fn export_dot(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    writeln!(out, "digraph stackgraph {{").unwrap();
    writeln!(out, "  rankdir=LR;").unwrap();
    writeln!(out, "  node [shape=box, fontsize=10];").unwrap();
    writeln!(out).unwrap();

    for node in graph.nodes() {
        let color = if is_shared(graph, node) {
            "#e0e0ff"
        } else {
            "#ffffff"
        };
        writeln!(
            out,
            "  \"{}\" [style=filled, fillcolor=\"{}\"];",
            dot_escape(node),
            color
        )
        .unwrap();
    }

    writeln!(out).unwrap();

    for (from, targets) in graph.edges() {
        for to in targets {
            writeln!(out, "  \"{}\" -> \"{}\";", dot_escape(from), dot_escape(to)).unwrap();
        }
    }

    writeln!(out, "}}").unwrap();
    out
}

/// Export the graph as a Mermaid flowchart string.
pub fn export_mermaid(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    writeln!(out, "flowchart LR").unwrap();

    for node in graph.nodes() {
        let id = mermaid_safe_id(node);
        let label = node.replace('"', "#quot;");
        if is_shared(graph, node) {
            writeln!(out, "  {}[(\"{}\")]", id, label).unwrap();
        } else {
            writeln!(out, "  {}[\"{}\"]", id, label).unwrap();
        }
    }

    writeln!(out).unwrap();

    for (from, targets) in graph.edges() {
        for to in targets {
            writeln!(
                out,
                "  {} --> {}",
                mermaid_safe_id(from),
                mermaid_safe_id(to)
            )
            .unwrap();
        }
    }

    out
}

/// Quote-safe DOT identifier body.
fn dot_escape(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Mermaid node ID: ASCII alphanumerics kept, every other character written
/// as `_<hex>_`, so distinct paths never share an ID.
fn mermaid_safe_id(id: &str) -> String {
    if id.is_empty() {
        return "root".to_string();
    }
    let mut safe = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() {
            safe.push(c);
        } else {
            write!(safe, "_{:x}_", u32::from(c)).unwrap();
        }
    }
    safe
}

/// Export the graph in the specified format.
pub fn export(graph: &DependencyGraph, format: ExportFormat) -> String {
    match format {
        ExportFormat::Dot => export_dot(graph),
        ExportFormat::Mermaid => export_mermaid(graph),
    }
}
