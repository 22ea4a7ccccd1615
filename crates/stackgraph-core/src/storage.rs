//! Read/write graph dump files from disk.

use crate::graph::DependencyGraph;
use crate::schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load a graph dump from disk.
pub fn load(path: &Path) -> Result<DependencyGraph> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph from {}", path.display()))?;
    schema::from_json(&json)
}

/// Save a graph dump, creating parent directories if needed.
pub fn save(path: &Path, graph: &DependencyGraph) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let json = schema::to_json(graph)?;
    fs::write(path, json).with_context(|| format!("failed to write graph to {}", path.display()))?;
    Ok(())
}
