//! CLI binary for stackgraph: map Terraform stack dependencies and pick the
//! stacks a change set requires re-applying.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stackgraph_build::{BuiltGraph, ConfigInspectTool, GraphBuilder};
use stackgraph_core::config::StackgraphConfig;
use stackgraph_nav::changes::collect_changed_files;
use stackgraph_nav::impact::compute_impact;
use stackgraph_nav::targets::{Selection, TargetFilter, TargetOutput};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "stackgraph",
    about = "Terraform stack dependency graph and change-impact targeting"
)]
struct Cli {
    /// Repository root (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Configuration root relative to the repository root (overrides config)
    #[arg(long, global = true)]
    terraform_root: Option<String>,

    /// Introspection executable (overrides config)
    #[arg(long, global = true)]
    tool: Option<String>,

    /// Log phase summaries to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the runnable stacks selected by --all, --targets, or changed files
    Targets {
        /// Select every runnable stack
        #[arg(long)]
        all: bool,

        /// Explicit stack directories (still filtered to runnable stacks)
        #[arg(long, num_args = 1..)]
        targets: Vec<String>,

        /// File listing changed paths (JSON array or one per line)
        #[arg(long)]
        changed_files: Option<PathBuf>,

        /// Changed paths given directly
        #[arg(long, num_args = 1..)]
        files: Vec<String>,

        /// Keep only stacks of this environment
        #[arg(long)]
        env: Option<String>,

        /// Output format: json, matrix
        #[arg(short, long, default_value = "json")]
        output: String,

        /// Also write the full graph dump to this file
        #[arg(long)]
        graph_output: Option<PathBuf>,
    },

    /// Print the whole dependency graph
    Graph {
        /// Output format: json, dot, mermaid
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Print every node affected by a change set, runnable or not
    Impact {
        /// File listing changed paths (JSON array or one per line)
        #[arg(long)]
        changed_files: Option<PathBuf>,

        /// Changed paths given directly
        #[arg(long, num_args = 1..)]
        files: Vec<String>,
    },

    /// Check graph integrity (dangling edges, forward/reverse mismatches)
    Validate {
        /// Validate a saved graph dump instead of building one
        #[arg(long)]
        graph: Option<PathBuf>,
    },
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn load_config(cli: &Cli, project_root: &Path) -> Result<StackgraphConfig> {
    let mut config = StackgraphConfig::load(project_root)?;
    if let Some(root) = &cli.terraform_root {
        config.layout.terraform_root.clone_from(root);
    }
    if let Some(tool) = &cli.tool {
        config.inspect.tool.clone_from(tool);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_root = get_project_root(&cli)?;
    let config = load_config(&cli, &project_root)?;

    match cli.command {
        Commands::Targets {
            all,
            targets,
            changed_files,
            files,
            env,
            output,
            graph_output,
        } => cmd_targets(
            &project_root,
            &config,
            &Selection {
                all,
                targets,
                changed_list: changed_files,
                files,
                env,
            },
            &output,
            graph_output.as_deref(),
        ),
        Commands::Graph { format } => cmd_graph(&project_root, &config, &format),
        Commands::Impact {
            changed_files,
            files,
        } => cmd_impact(&project_root, &config, changed_files.as_deref(), &files),
        Commands::Validate { graph } => cmd_validate(&project_root, &config, graph.as_deref()),
    }
}

/// Check the introspection tool, then build the graph.
fn build_graph(project_root: &Path, config: &StackgraphConfig) -> Result<BuiltGraph> {
    let tool = ConfigInspectTool::new(config.inspect.tool.clone(), project_root);
    tool.check_available()?;
    GraphBuilder::new(project_root, config.clone(), tool).build()
}

fn cmd_targets(
    project_root: &Path,
    config: &StackgraphConfig,
    selection: &Selection,
    output: &str,
    graph_output: Option<&Path>,
) -> Result<()> {
    let output = match output {
        "json" => TargetOutput::List,
        "matrix" => TargetOutput::Matrix,
        _ => anyhow::bail!("Unknown output format: {}. Use 'json' or 'matrix'.", output),
    };

    let built = build_graph(project_root, config)?;
    if let Some(path) = graph_output {
        stackgraph_core::storage::save(path, &built.graph)?;
    }

    let filter = TargetFilter::new(project_root, config.layout.clone());
    let targets = stackgraph_nav::targets::select(&built.graph, &filter, selection);
    println!("{}", filter.render(&targets, output)?);
    Ok(())
}

fn cmd_graph(project_root: &Path, config: &StackgraphConfig, format: &str) -> Result<()> {
    let export_format = match format {
        "json" => None,
        "dot" | "graphviz" => Some(stackgraph_nav::export::ExportFormat::Dot),
        "mermaid" | "md" => Some(stackgraph_nav::export::ExportFormat::Mermaid),
        _ => anyhow::bail!(
            "Unknown graph format: {}. Use 'json', 'dot' or 'mermaid'.",
            format
        ),
    };

    let built = build_graph(project_root, config)?;
    match export_format {
        None => println!("{}", stackgraph_core::schema::to_json(&built.graph)?),
        Some(f) => print!("{}", stackgraph_nav::export::export(&built.graph, f)),
    }
    Ok(())
}

fn cmd_impact(
    project_root: &Path,
    config: &StackgraphConfig,
    changed_files: Option<&Path>,
    files: &[String],
) -> Result<()> {
    let built = build_graph(project_root, config)?;
    let changes = collect_changed_files(changed_files, files);
    if let Some(e) = &changes.read_error {
        eprintln!("Error reading changed files: {:#}", e);
    }
    let impact = compute_impact(&built.graph, &changes.files);
    println!("{}", serde_json::to_string_pretty(&impact)?);
    Ok(())
}

fn cmd_validate(
    project_root: &Path,
    config: &StackgraphConfig,
    dump: Option<&Path>,
) -> Result<()> {
    let graph = match dump {
        Some(path) => stackgraph_core::storage::load(path)?,
        None => {
            let built = build_graph(project_root, config)?;
            for conflict in built.backends.conflicts() {
                println!(
                    "WARN: backend {} claimed by {} and {}; using {}",
                    conflict.coordinate, conflict.kept, conflict.ignored, conflict.kept
                );
            }
            built.graph
        }
    };

    let issues = graph.validate();
    for issue in &issues {
        println!("ERROR: {}", issue);
    }

    if issues.is_empty() {
        eprintln!("Graph is valid. No integrity issues found.");
        eprintln!(
            "  {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    } else {
        anyhow::bail!("Found {} integrity issue(s).", issues.len())
    }
}
