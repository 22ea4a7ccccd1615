//! Structural introspection of a configuration directory.
//!
//! The [`Introspector`] trait is the seam: given a directory, produce its module
//! calls and data-source declarations. [`ConfigInspectTool`] implements it by
//! running `terraform-config-inspect --json <dir>` (or a compatible tool).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Data-source type that reads another stack's state.
pub const REMOTE_STATE_TYPE: &str = "terraform_remote_state";

/// Errors from introspecting a directory.
///
/// Only `ToolUnavailable` from the up-front availability check is fatal; every
/// other error means "no dependencies known for this directory".
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("introspection tool `{tool}` not found on PATH")]
    ToolUnavailable { tool: String },
    #[error("failed to run `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("`{tool}` failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("unparsable output from `{tool}`: {source}")]
    Malformed {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The part of the tool's JSON report stackgraph reads. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModuleReport {
    #[serde(default)]
    pub module_calls: BTreeMap<String, ModuleCall>,
    #[serde(default)]
    pub data_resources: BTreeMap<String, DataResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModuleCall {
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataResource {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub pos: Option<SourcePos>,
}

/// Approximate declaration position reported by the tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourcePos {
    pub filename: String,
    #[serde(default = "first_line")]
    pub line: usize,
}

fn first_line() -> usize {
    1
}

impl ModuleReport {
    /// Remote-state data sources with a known position.
    pub fn remote_states(&self) -> impl Iterator<Item = (&str, &SourcePos)> {
        self.data_resources.iter().filter_map(|(key, resource)| {
            if resource.kind != REMOTE_STATE_TYPE {
                return None;
            }
            resource.pos.as_ref().map(|pos| (key.as_str(), pos))
        })
    }
}

/// Parse the tool's JSON output.
pub fn parse_report(json: &str) -> Result<ModuleReport, serde_json::Error> {
    serde_json::from_str(json)
}

/// Produces the structural report for a directory.
///
/// `dir` is the node id: a path relative to the repository root.
pub trait Introspector {
    fn inspect(&self, dir: &Path) -> Result<ModuleReport, InspectError>;
}

impl<T: Introspector + ?Sized> Introspector for &T {
    fn inspect(&self, dir: &Path) -> Result<ModuleReport, InspectError> {
        (**self).inspect(dir)
    }
}

/// Runs an external `terraform-config-inspect`-compatible executable from the
/// repository root, so reported filenames are repo-relative.
#[derive(Debug, Clone)]
pub struct ConfigInspectTool {
    program: String,
    working_dir: PathBuf,
}

impl ConfigInspectTool {
    pub fn new(program: impl Into<String>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: repo_root.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fail with `ToolUnavailable` if the executable cannot be started at all.
    /// The tool's own exit status is irrelevant here.
    pub fn check_available(&self) -> Result<(), InspectError> {
        match Command::new(&self.program)
            .arg("--version")
            .current_dir(&self.working_dir)
            .output()
        {
            Ok(_) => Ok(()),
            Err(e) => Err(self.spawn_error(e)),
        }
    }

    fn spawn_error(&self, source: io::Error) -> InspectError {
        if source.kind() == io::ErrorKind::NotFound {
            InspectError::ToolUnavailable {
                tool: self.program.clone(),
            }
        } else {
            InspectError::Spawn {
                tool: self.program.clone(),
                source,
            }
        }
    }
}

impl Introspector for ConfigInspectTool {
    fn inspect(&self, dir: &Path) -> Result<ModuleReport, InspectError> {
        let output = Command::new(&self.program)
            .arg("--json")
            .arg(dir)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(InspectError::Failed {
                tool: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_report(&stdout).map_err(|source| InspectError::Malformed {
            tool: self.program.clone(),
            source,
        })
    }
}
