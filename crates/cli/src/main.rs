//! `kubeforge` CLI entry-point.
//!
//! Sub-commands:
//! - `create cluster` — plan and execute the provisioning pipeline.
//! - `plan`           — print the merged execution graph without running.
//! - `validate`       — load, default, and validate a cluster file.
//!
//! Exit codes: 0 on success, 1 when execution failed (or partially failed),
//! 2 on configuration/planning errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use config::Inventory;
use connector::{ConnectorPool, LocalConnectorFactory};
use engine::{Engine, GraphExecutionResult, PipelineStatus, StepStatus};
use steps::RunContext;

mod recipe;

const EXIT_EXECUTION_FAILED: u8 = 1;
const EXIT_PLANNING_ERROR: u8 = 2;

#[derive(Parser)]
#[command(
    name = "kubeforge",
    about = "Graph-scheduled Kubernetes cluster provisioning",
    version
)]
struct Cli {
    /// Verbose logging (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision a new resource.
    Create {
        #[command(subcommand)]
        target: CreateTarget,
    },
    /// Print the merged execution graph for a cluster file.
    Plan(ClusterArgs),
    /// Validate a cluster file and print the resolved inventory.
    Validate(ClusterArgs),
}

#[derive(Subcommand)]
enum CreateTarget {
    /// Plan and execute the full provisioning pipeline.
    Cluster(CreateArgs),
}

#[derive(Args)]
struct ClusterArgs {
    /// Path to the cluster JSON file.
    #[arg(long, env = "KUBEFORGE_CONFIG")]
    config: PathBuf,
}

#[derive(Args)]
struct CreateArgs {
    #[command(flatten)]
    cluster: ClusterArgs,

    /// Simulate every step without mutating any host, and print the planned
    /// graph and simulated results as JSON.
    #[arg(long)]
    dry_run: bool,

    /// Engine worker-pool size.
    #[arg(long, default_value_t = engine::DEFAULT_WORKER_POOL)]
    workers: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_PLANNING_ERROR)
        }
    }
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Validate(args) => validate(&args),
        Command::Plan(args) => plan(&args),
        Command::Create {
            target: CreateTarget::Cluster(args),
        } => create_cluster(args).await,
    }
}

fn validate(args: &ClusterArgs) -> anyhow::Result<ExitCode> {
    let spec = config::load_cluster_spec(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    println!("cluster '{}' is valid", spec.name);
    for host in Inventory::from_spec(&spec).hosts() {
        let roles: Vec<&str> = host.roles.iter().map(String::as_str).collect();
        println!("  {:<16} {:<16} [{}]", host.name, host.address, roles.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn plan(args: &ClusterArgs) -> anyhow::Result<ExitCode> {
    let spec = config::load_cluster_spec(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let inventory = Inventory::from_spec(&spec);

    let registry = recipe::default_registry(&spec);
    let pipeline = recipe::provisioning_pipeline(&spec, &registry)?;
    let graph = pipeline.plan(&inventory)?;

    println!("{}", serde_json::to_string_pretty(&graph.summary())?);
    Ok(ExitCode::SUCCESS)
}

async fn create_cluster(args: CreateArgs) -> anyhow::Result<ExitCode> {
    let spec = config::load_cluster_spec(&args.cluster.config)
        .with_context(|| format!("loading {}", args.cluster.config.display()))?;
    let inventory = Inventory::from_spec(&spec);

    let registry = Arc::new(recipe::default_registry(&spec));
    let pipeline = recipe::provisioning_pipeline(&spec, &registry)?;

    let connectors = Arc::new(ConnectorPool::new(Arc::new(LocalConnectorFactory)));
    let ctx = RunContext::new(&pipeline.name, connectors, Arc::clone(&registry))
        .with_dry_run(args.dry_run);

    if args.dry_run {
        let graph = pipeline.plan(&inventory)?;
        println!("{}", serde_json::to_string_pretty(&graph.summary())?);
    }

    let engine = Engine::with_workers(args.workers);
    let result = pipeline.run(&inventory, &engine, &ctx).await?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(match result.status {
        PipelineStatus::Succeeded => ExitCode::SUCCESS,
        PipelineStatus::Failed | PipelineStatus::PartialFailure => {
            ExitCode::from(EXIT_EXECUTION_FAILED)
        }
    })
}

fn print_summary(result: &GraphExecutionResult) {
    println!();
    for node in &result.node_results {
        println!(
            "{:>9}  {} @ {} ({})",
            node.status.to_string(),
            node.step_name,
            node.host,
            node.phase
        );
    }

    for failure in result.failures() {
        println!();
        println!("failure: {} @ {}", failure.step_name, failure.host);
        if let Some(err) = &failure.error {
            println!("  error: {err}");
        }
        if !failure.stderr.is_empty() {
            println!("  stderr: {}", failure.stderr.trim_end());
        }
    }

    let skipped = result.count_with_status(StepStatus::Skipped);
    println!();
    println!(
        "pipeline '{}': {} ({} results, {} failed, {} skipped)",
        result.pipeline_name,
        result.status,
        result.node_results.len(),
        result.failures().count(),
        skipped,
    );
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
