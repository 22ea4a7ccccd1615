//! Changed-file list input.

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a changed-file list: a JSON array of strings, or one path per line.
///
/// Valid JSON that is not an array of strings yields no paths.
pub fn parse_changed_files(content: &str) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(path) => Some(path),
                other => {
                    tracing::debug!("skipping non-string changed-file entry {}", other);
                    None
                }
            })
            .collect(),
        Ok(_) => {
            tracing::warn!("changed-file list is JSON but not an array; ignoring it");
            Vec::new()
        }
        Err(_) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Read and parse a changed-file list from disk.
pub fn read_changed_files(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read changed-file list {}", path.display()))?;
    Ok(parse_changed_files(&content))
}

/// Changed paths gathered from a list file and direct arguments.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub files: Vec<String>,
    /// Set when the list file could not be read; `files` still holds the
    /// direct arguments.
    pub read_error: Option<anyhow::Error>,
}

/// Changed files from the list file (if readable) plus direct arguments.
pub fn collect_changed_files(list: Option<&Path>, files: &[String]) -> ChangeSet {
    let mut set = ChangeSet::default();
    if let Some(path) = list {
        match read_changed_files(path) {
            Ok(listed) => set.files.extend(listed),
            Err(e) => set.read_error = Some(e),
        }
    }
    set.files.extend(files.iter().cloned());
    tracing::debug!("{} changed files", set.files.len());
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array() {
        let files = parse_changed_files(r#"["env/dev/app/main.tf", "README.md"]"#);
        assert_eq!(files, vec!["env/dev/app/main.tf", "README.md"]);
    }

    #[test]
    fn test_line_list() {
        let files = parse_changed_files("env/dev/app/main.tf\n\n  modules/vpc/vars.tf  \n");
        assert_eq!(files, vec!["env/dev/app/main.tf", "modules/vpc/vars.tf"]);
    }

    #[test]
    fn test_non_list_json_is_empty() {
        assert!(parse_changed_files(r#"{"files": ["a.tf"]}"#).is_empty());
        assert!(parse_changed_files("\"a.tf\"").is_empty());
        assert!(parse_changed_files("").is_empty());
    }

    #[test]
    fn test_single_bare_path_is_a_line() {
        assert_eq!(parse_changed_files("main.tf"), vec!["main.tf"]);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_changed_files(&tmp.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_collect_merges_list_and_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let list = tmp.path().join("changed.txt");
        std::fs::write(&list, "a/main.tf\n").unwrap();
        let set = collect_changed_files(Some(&list), &["b/main.tf".to_string()]);
        assert!(set.read_error.is_none());
        assert_eq!(set.files, vec!["a/main.tf", "b/main.tf"]);
    }

    #[test]
    fn test_collect_unreadable_list_keeps_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.json");
        let set = collect_changed_files(Some(&missing), &["b/main.tf".to_string()]);
        let err = set.read_error.expect("missing list is reported");
        assert!(format!("{:#}", err).contains("nope.json"));
        assert_eq!(set.files, vec!["b/main.tf"]);
    }
}
