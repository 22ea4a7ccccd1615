//! Integration tests for stackgraph-cli functionality.
//! Tests the library pipeline the CLI commands invoke.

use stackgraph_build::inspect::{DataResource, InspectError, ModuleCall, SourcePos};
use stackgraph_build::{GraphBuilder, Introspector, ModuleReport};
use stackgraph_core::config::StackgraphConfig;
use stackgraph_nav::changes::read_changed_files;
use stackgraph_nav::impact::compute_impact;
use stackgraph_nav::targets::{Selection, TargetFilter, TargetOutput, select};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const TF_ROOT: &str = "infrastructure/IAC/Terraform";

struct CannedReports(BTreeMap<String, ModuleReport>);

impl Introspector for CannedReports {
    fn inspect(&self, dir: &Path) -> Result<ModuleReport, InspectError> {
        Ok(self
            .0
            .get(dir.to_string_lossy().as_ref())
            .cloned()
            .unwrap_or_default())
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn backend(bucket: &str, prefix: &str) -> String {
    format!(
        "terraform {{\n  backend \"gcs\" {{\n    bucket = \"{}\"\n    prefix = \"{}\"\n  }}\n}}\n",
        bucket, prefix
    )
}

/// dev/app and prod/app both read the shared network stack of their env and
/// use the vpc module; dev/net reads dev/app's state.
fn make_repo(root: &Path) -> CannedReports {
    for env in ["dev", "prod"] {
        write(
            root,
            &format!("{}/env/{}/app/backend.tf", TF_ROOT, env),
            &backend("tf-state", &format!("{}/app", env)),
        );
        write(
            root,
            &format!("{}/env/{}/app/main.tf", TF_ROOT, env),
            "module \"vpc\" {\n  source = \"../../../modules/vpc\"\n}\n",
        );
    }
    write(
        root,
        &format!("{}/env/dev/net/backend.tf", TF_ROOT),
        &backend("tf-state", "dev/net"),
    );
    write(
        root,
        &format!("{}/env/dev/net/remote.tf", TF_ROOT),
        "data \"terraform_remote_state\" \"app\" {\n  backend = \"gcs\"\n  config = {\n    bucket = var.state_bucket\n    prefix = \"dev/app\"\n  }\n}\n",
    );
    write(
        root,
        &format!("{}/env/dev/net/terraform.tfvars", TF_ROOT),
        "state_bucket = \"tf-state\"\n",
    );
    write(
        root,
        &format!("{}/modules/vpc/main.tf", TF_ROOT),
        "resource \"google_compute_network\" \"vpc\" {}\n",
    );

    let mut reports = BTreeMap::new();
    for env in ["dev", "prod"] {
        let mut report = ModuleReport::default();
        report.module_calls.insert(
            "vpc".to_string(),
            ModuleCall {
                source: "../../../modules/vpc".to_string(),
            },
        );
        reports.insert(format!("{}/env/{}/app", TF_ROOT, env), report);
    }
    let mut net = ModuleReport::default();
    net.data_resources.insert(
        "data.terraform_remote_state.app".to_string(),
        DataResource {
            kind: "terraform_remote_state".to_string(),
            pos: Some(SourcePos {
                filename: format!("{}/env/dev/net/remote.tf", TF_ROOT),
                line: 1,
            }),
        },
    );
    reports.insert(format!("{}/env/dev/net", TF_ROOT), net);
    CannedReports(reports)
}

#[test]
fn test_config_defaults_without_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let config = StackgraphConfig::load(tmpdir.path()).unwrap();
    assert_eq!(config.layout.terraform_root, TF_ROOT);
    assert_eq!(config.inspect.tool, "terraform-config-inspect");
}

#[test]
fn test_all_targets() {
    let tmpdir = tempfile::tempdir().unwrap();
    let reports = make_repo(tmpdir.path());
    let config = StackgraphConfig::load(tmpdir.path()).unwrap();

    let built = GraphBuilder::new(tmpdir.path(), config.clone(), reports)
        .build()
        .unwrap();
    let filter = TargetFilter::new(tmpdir.path(), config.layout);
    let targets = filter.filter(built.graph.nodes());
    assert_eq!(
        targets,
        vec![
            format!("{}/env/dev/app", TF_ROOT),
            format!("{}/env/dev/net", TF_ROOT),
            format!("{}/env/prod/app", TF_ROOT),
        ]
    );
}

#[test]
fn test_module_change_selects_dependent_stacks_as_matrix() {
    let tmpdir = tempfile::tempdir().unwrap();
    let reports = make_repo(tmpdir.path());
    let config = StackgraphConfig::load(tmpdir.path()).unwrap();
    let built = GraphBuilder::new(tmpdir.path(), config.clone(), reports)
        .build()
        .unwrap();

    let list = tmpdir.path().join("changed.json");
    fs::write(
        &list,
        format!(r#"["{}/modules/vpc/main.tf", "README.md"]"#, TF_ROOT),
    )
    .unwrap();
    let changed = read_changed_files(&list).unwrap();
    let impact = compute_impact(&built.graph, &changed);
    assert_eq!(impact.len(), 4);

    let filter = TargetFilter::new(tmpdir.path(), config.layout);
    let targets = filter.filter_env(filter.filter(impact.nodes()), "dev");
    let matrix = serde_json::to_value(filter.matrix(&targets)).unwrap();
    assert_eq!(
        matrix,
        serde_json::json!([
            {"dir": format!("{}/env/dev/app", TF_ROOT), "env": "dev"},
            {"dir": format!("{}/env/dev/net", TF_ROOT), "env": "dev"},
        ])
    );
}

#[test]
fn test_graph_dump_roundtrip_and_validate() {
    let tmpdir = tempfile::tempdir().unwrap();
    let reports = make_repo(tmpdir.path());
    let config = StackgraphConfig::load(tmpdir.path()).unwrap();
    let built = GraphBuilder::new(tmpdir.path(), config, reports)
        .build()
        .unwrap();

    let dump = tmpdir.path().join("out/graph.json");
    stackgraph_core::storage::save(&dump, &built.graph).unwrap();
    let loaded = stackgraph_core::storage::load(&dump).unwrap();
    assert_eq!(loaded, built.graph);
    assert!(loaded.validate().is_empty());
    assert!(
        loaded
            .dependents(&format!("{}/env/dev/app", TF_ROOT))
            .contains(&format!("{}/env/dev/net", TF_ROOT))
    );
}

#[test]
fn test_config_file_overrides_layout() {
    let tmpdir = tempfile::tempdir().unwrap();
    write(
        tmpdir.path(),
        ".stackgraph/config.toml",
        "[layout]\nterraform_root = \"tf\"\nenv_dir = \"stacks\"\n",
    );
    write(tmpdir.path(), "tf/stacks/qa/app/backend.tf", &backend("b", "qa"));
    let config = StackgraphConfig::load(tmpdir.path()).unwrap();

    let built = GraphBuilder::new(
        tmpdir.path(),
        config.clone(),
        CannedReports(BTreeMap::new()),
    )
    .build()
    .unwrap();
    let filter = TargetFilter::new(tmpdir.path(), config.layout);
    let matrix = filter.matrix(&filter.filter(built.graph.nodes()));
    assert_eq!(matrix.len(), 1);
    assert_eq!(matrix[0].env, "qa");
}

#[test]
fn test_targets_selection_and_rendering() {
    let tmpdir = tempfile::tempdir().unwrap();
    let reports = make_repo(tmpdir.path());
    let config = StackgraphConfig::load(tmpdir.path()).unwrap();
    let built = GraphBuilder::new(tmpdir.path(), config.clone(), reports)
        .build()
        .unwrap();
    let filter = TargetFilter::new(tmpdir.path(), config.layout);

    let selection = Selection {
        changed_list: Some(tmpdir.path().join("missing.txt")),
        files: vec![format!("{}/env/prod/app/main.tf", TF_ROOT)],
        ..Selection::default()
    };
    let targets = select(&built.graph, &filter, &selection);
    assert_eq!(
        filter.render(&targets, TargetOutput::Matrix).unwrap(),
        format!(r#"[{{"dir":"{}/env/prod/app","env":"prod"}}]"#, TF_ROOT)
    );

    let none = Selection {
        all: true,
        env: Some("qa".to_string()),
        ..Selection::default()
    };
    let targets = select(&built.graph, &filter, &none);
    assert_eq!(filter.render(&targets, TargetOutput::List).unwrap(), "[]");
}
