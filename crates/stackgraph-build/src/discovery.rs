//! Node discovery: every directory under the configuration root that directly
//! contains a `*.tf` file.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use stackgraph_core::config::LayoutConfig;
use stackgraph_core::paths;
use stackgraph_parser::files;
use std::collections::BTreeSet;
use std::path::Path;

/// Custom ignore file honoured during discovery, in `.gitignore` syntax.
pub const IGNORE_FILE: &str = ".stackgraphignore";

fn build_exclude_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        builder.add(Glob::new(p).with_context(|| format!("invalid exclude glob {:?}", p))?);
    }
    Ok(Some(builder.build().context("invalid exclude glob set")?))
}

/// A directory is excluded when a glob matches its path, or its path with a
/// trailing `/` (so `dir/**` covers `dir` itself).
fn is_excluded(exclude: &GlobSet, node: &str) -> bool {
    exclude.is_match(node) || exclude.is_match(format!("{}/", node))
}

/// Find configuration directories under `layout.terraform_root`.
///
/// Hidden directories (such as `.terraform/` module caches) are skipped, as
/// are paths matched by `.gitignore`, `.stackgraphignore`, or `layout.exclude`.
/// A missing configuration root yields an empty set.
pub fn discover_nodes(repo_root: &Path, layout: &LayoutConfig) -> Result<BTreeSet<String>> {
    let exclude = build_exclude_set(&layout.exclude)?;
    let tf_root = repo_root.join(&layout.terraform_root);
    let mut nodes = BTreeSet::new();

    if !tf_root.is_dir() {
        tracing::warn!(
            "configuration root {} does not exist; no stacks discovered",
            tf_root.display()
        );
        return Ok(nodes);
    }

    let mut builder = ignore::WalkBuilder::new(&tf_root);
    builder
        .hidden(true)
        .git_ignore(true)
        .add_custom_ignore_filename(IGNORE_FILE);
    if let Some(exc) = exclude {
        // Prune excluded directories so nothing beneath them is visited.
        let root = repo_root.to_path_buf();
        builder.filter_entry(move |entry| {
            if !entry.file_type().is_some_and(|t| t.is_dir()) {
                return true;
            }
            paths::relative_to(&root, entry.path()).is_none_or(|node| !is_excluded(&exc, &node))
        });
    }
    let walker = builder.build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_dir()) {
            continue;
        }
        let Some(node) = paths::relative_to(repo_root, entry.path()) else {
            continue;
        };
        if files::has_declaration_files(entry.path()) {
            nodes.insert(node);
        }
    }

    tracing::info!("discovered {} configuration directories", nodes.len());
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn layout(root: &str) -> LayoutConfig {
        LayoutConfig {
            terraform_root: root.to_string(),
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn test_discovers_directories_with_tf_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tf/env/dev/app/main.tf");
        touch(tmp.path(), "tf/env/dev/net/network.tf");
        touch(tmp.path(), "tf/env/dev/docs/README.md");
        touch(tmp.path(), "tf/modules/vpc/main.tf");
        touch(tmp.path(), "elsewhere/main.tf");

        let nodes = discover_nodes(tmp.path(), &layout("tf")).unwrap();
        let nodes: Vec<&str> = nodes.iter().map(String::as_str).collect();
        assert_eq!(
            nodes,
            vec!["tf/env/dev/app", "tf/env/dev/net", "tf/modules/vpc"]
        );
    }

    #[test]
    fn test_skips_hidden_module_cache() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tf/env/dev/app/main.tf");
        touch(tmp.path(), "tf/env/dev/app/.terraform/modules/vpc/main.tf");

        let nodes = discover_nodes(tmp.path(), &layout("tf")).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes.contains("tf/env/dev/app"));
    }

    #[test]
    fn test_exclude_globs_and_ignore_file() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tf/env/dev/app/main.tf");
        touch(tmp.path(), "tf/env/dev/scratch/main.tf");
        touch(tmp.path(), "tf/legacy/old/main.tf");
        fs::write(tmp.path().join("tf").join(IGNORE_FILE), "legacy/\n").unwrap();

        let mut layout = layout("tf");
        layout.exclude = vec!["**/scratch".to_string()];
        let nodes = discover_nodes(tmp.path(), &layout).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes.contains("tf/env/dev/app"));
    }

    #[test]
    fn test_exclude_prunes_whole_subtree() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "tf/env/dev/app/main.tf");
        touch(tmp.path(), "tf/legacy/main.tf");
        touch(tmp.path(), "tf/legacy/old/main.tf");
        touch(tmp.path(), "tf/legacy/old/deeper/main.tf");
        touch(tmp.path(), "tf/env/dev/scratch/main.tf");
        touch(tmp.path(), "tf/env/dev/scratch/tmp/main.tf");

        let mut layout = layout("tf");
        layout.exclude = vec!["**/legacy".to_string(), "**/scratch/**".to_string()];
        let nodes = discover_nodes(tmp.path(), &layout).unwrap();
        let nodes: Vec<&str> = nodes.iter().map(String::as_str).collect();
        assert_eq!(nodes, vec!["tf/env/dev/app"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let nodes = discover_nodes(tmp.path(), &layout("does/not/exist")).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_invalid_glob_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut layout = layout("tf");
        layout.exclude = vec!["a/{b".to_string()];
        assert!(discover_nodes(tmp.path(), &layout).is_err());
    }
}
