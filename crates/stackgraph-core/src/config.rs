//! Configuration for repository layout, backend matching, and introspection.
//!
//! Load order: `.stackgraph/config.toml` → environment variables → defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Top-level stackgraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackgraphConfig {
    pub layout: LayoutConfig,
    pub backend: BackendConfig,
    pub inspect: InspectConfig,
}

/// Where configuration directories live and how deployable roots are recognised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Configuration root, relative to the repository root.
    pub terraform_root: String,
    /// Path segment under the configuration root that holds environment stacks.
    pub env_dir: String,
    /// Path segment marking reusable-module directories.
    pub modules_dir: String,
    /// File whose presence marks a deployable root stack.
    pub backend_file: String,
    /// Extra glob patterns (repo-relative) excluded from node discovery.
    pub exclude: Vec<String>,
}

/// Remote-storage backend matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend type literal expected after the `backend` keyword.
    pub kind: String,
}

/// Structural introspection tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Executable invoked as `<tool> --json <directory>`.
    pub tool: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            terraform_root: "infrastructure/IAC/Terraform".to_string(),
            env_dir: "env".to_string(),
            modules_dir: "modules".to_string(),
            backend_file: "backend.tf".to_string(),
            exclude: Vec::new(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: "gcs".to_string(),
        }
    }
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            tool: "terraform-config-inspect".to_string(),
        }
    }
}

impl LayoutConfig {
    /// Repo-relative path of the environment subtree, e.g. `infrastructure/IAC/Terraform/env`.
    pub fn env_root(&self) -> String {
        let root = self.terraform_root.trim_end_matches('/');
        if root.is_empty() || root == "." {
            self.env_dir.clone()
        } else {
            format!("{}/{}", root, self.env_dir)
        }
    }
}

/// Helper to apply a string env var to a config field.
fn env_override(var: &str, target: &mut String) {
    if let Ok(v) = std::env::var(var)
        && !v.trim().is_empty()
    {
        *target = v.trim().to_string();
    }
}

fn is_single_segment(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl StackgraphConfig {
    /// Load config from `.stackgraph/config.toml` in the repository root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(".stackgraph").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("invalid config file {}", config_path.display()))?
        } else {
            Self::default()
        };

        env_override(
            "STACKGRAPH_TERRAFORM_ROOT",
            &mut config.layout.terraform_root,
        );
        env_override("STACKGRAPH_ENV_DIR", &mut config.layout.env_dir);
        env_override("STACKGRAPH_MODULES_DIR", &mut config.layout.modules_dir);
        env_override("STACKGRAPH_BACKEND_FILE", &mut config.layout.backend_file);
        env_override("STACKGRAPH_BACKEND_KIND", &mut config.backend.kind);
        env_override("STACKGRAPH_INSPECT_TOOL", &mut config.inspect.tool);

        config.validate()?;
        Ok(config)
    }

    /// Check layout invariants. Called by `load`, and again by callers that
    /// override fields afterwards.
    pub fn validate(&self) -> Result<()> {
        let root = Path::new(&self.layout.terraform_root);
        if root.is_absolute() {
            anyhow::bail!(
                "terraform_root must be relative to the repository root, got {}",
                self.layout.terraform_root
            );
        }
        if root.components().any(|c| matches!(c, Component::ParentDir)) {
            anyhow::bail!(
                "terraform_root must not leave the repository root, got {}",
                self.layout.terraform_root
            );
        }
        for (name, value) in [
            ("env_dir", &self.layout.env_dir),
            ("modules_dir", &self.layout.modules_dir),
            ("backend_file", &self.layout.backend_file),
        ] {
            if !is_single_segment(value) {
                anyhow::bail!("{} must be a single path segment, got {:?}", name, value);
            }
        }
        if self.backend.kind.trim().is_empty() {
            anyhow::bail!("backend.kind must not be empty");
        }
        if self.inspect.tool.trim().is_empty() {
            anyhow::bail!("inspect.tool must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StackgraphConfig::default();
        assert_eq!(config.layout.terraform_root, "infrastructure/IAC/Terraform");
        assert_eq!(config.layout.env_dir, "env");
        assert_eq!(config.layout.modules_dir, "modules");
        assert_eq!(config.layout.backend_file, "backend.tf");
        assert_eq!(config.backend.kind, "gcs");
        assert_eq!(config.inspect.tool, "terraform-config-inspect");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[layout]
terraform_root = "terraform"
exclude = ["**/scratch/**"]

[backend]
kind = "s3"
"#;
        let config: StackgraphConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.layout.terraform_root, "terraform");
        assert_eq!(config.layout.exclude, vec!["**/scratch/**".to_string()]);
        assert_eq!(config.backend.kind, "s3");
        // Defaults for unspecified fields
        assert_eq!(config.layout.env_dir, "env");
        assert_eq!(config.inspect.tool, "terraform-config-inspect");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = StackgraphConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.layout.modules_dir, "modules");
    }

    #[test]
    fn test_load_reads_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".stackgraph");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            "[layout]\nterraform_root = \"infra\"\nenv_dir = \"stacks\"\n",
        )
        .unwrap();

        let config = StackgraphConfig::load(tmp.path()).unwrap();
        assert_eq!(config.layout.terraform_root, "infra");
        assert_eq!(config.layout.env_root(), "infra/stacks");
    }

    #[test]
    fn test_rejects_escaping_root() {
        let mut config = StackgraphConfig::default();
        config.layout.terraform_root = "../elsewhere".to_string();
        assert!(config.validate().is_err());

        config.layout.terraform_root = "/abs/path".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_multi_segment_designators() {
        let mut config = StackgraphConfig::default();
        config.layout.env_dir = "env/dev".to_string();
        assert!(config.validate().is_err());

        let mut config = StackgraphConfig::default();
        config.layout.modules_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_root_with_dot_root() {
        let mut layout = LayoutConfig::default();
        layout.terraform_root = ".".to_string();
        assert_eq!(layout.env_root(), "env");
        layout.terraform_root = "tf/".to_string();
        assert_eq!(layout.env_root(), "tf/env");
    }
}
