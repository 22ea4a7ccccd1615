//! Effective variable values for one directory.
//!
//! Layers, later overwriting earlier: `variable` defaults from every `*.tf`
//! file, then `terraform.tfvars`, then each `*.auto.tfvars` in name order.
//! Command-line and environment overrides are not modelled.

use crate::extract::{tfvars_assignments, variable_defaults};
use crate::files::{self, PRIMARY_OVERRIDE_FILE};
use std::collections::BTreeMap;
use std::path::Path;

/// Variable name → resolved string value, scoped to one directory.
pub type VariableMap = BTreeMap<String, String>;

/// Build the merged variable map for `dir`.
///
/// Best-effort: unreadable or truncated files contribute what they can and
/// are logged.
pub fn resolve_variables(dir: &Path) -> VariableMap {
    let mut vars = VariableMap::new();

    for file in files::declaration_files(dir) {
        match files::read_source(&file) {
            Ok(source) => {
                let scan = variable_defaults(&source);
                if let Some(err) = scan.error {
                    tracing::debug!("partial variable scan of {}: {}", file.display(), err);
                }
                vars.extend(scan.defaults);
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    let primary = dir.join(PRIMARY_OVERRIDE_FILE);
    let overrides = primary
        .is_file()
        .then_some(primary)
        .into_iter()
        .chain(files::auto_override_files(dir));
    for file in overrides {
        match files::read_source(&file) {
            Ok(source) => vars.extend(tfvars_assignments(&source)),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    vars
}
