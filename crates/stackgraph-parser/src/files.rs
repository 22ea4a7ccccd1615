//! Classification and listing of Terraform files.

use crate::scanner::ScanError;
use std::path::{Path, PathBuf};

/// Extension of declaration files.
pub const DECLARATION_EXT: &str = "tf";
/// Extension of variable-override files.
pub const OVERRIDE_EXT: &str = "tfvars";
/// The primary override file, applied before auto-loaded ones.
pub const PRIMARY_OVERRIDE_FILE: &str = "terraform.tfvars";
/// Suffix of auto-loaded override files.
pub const AUTO_OVERRIDE_SUFFIX: &str = ".auto.tfvars";

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// `*.tf`
pub fn is_declaration_file(path: &Path) -> bool {
    has_extension(path, DECLARATION_EXT)
}

/// `*.tfvars`, including `*.auto.tfvars`.
pub fn is_override_file(path: &Path) -> bool {
    has_extension(path, OVERRIDE_EXT)
}

/// A file whose change can alter a stack: a declaration or override file.
pub fn is_config_file(path: &Path) -> bool {
    is_declaration_file(path) || is_override_file(path)
}

fn is_auto_override(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(AUTO_OVERRIDE_SUFFIX))
}

/// Regular files directly inside `dir` that satisfy `pred`, sorted by name.
/// An unreadable directory yields an empty list.
fn list_files(dir: &Path, pred: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && pred(p.as_path()))
        .collect();
    files.sort();
    files
}

/// Declaration files directly inside `dir`, sorted by name.
pub fn declaration_files(dir: &Path) -> Vec<PathBuf> {
    list_files(dir, is_declaration_file)
}

/// Auto-loaded override files directly inside `dir`, sorted by name.
pub fn auto_override_files(dir: &Path) -> Vec<PathBuf> {
    list_files(dir, is_auto_override)
}

/// True if `dir` directly contains at least one declaration file.
pub fn has_declaration_files(dir: &Path) -> bool {
    !declaration_files(dir).is_empty()
}

/// Read a file as UTF-8 text.
pub fn read_source(path: &Path) -> Result<String, ScanError> {
    std::fs::read_to_string(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })
}
