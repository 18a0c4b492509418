//! `flowrun` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`: execute a workflow JSON file and print the run record.
//! - `validate`: check a workflow JSON file without running it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{EngineConfig, RunStatus, Workflow, WorkflowEngine};
use nodes::NodeRegistry;

const DEFAULT_LOG_FILTER: &str = "flowrun=info,engine=info,nodes=info,warn";

#[derive(Parser)]
#[command(name = "flowrun", about = "Run node-graph workflows", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow definition and print the run as JSON.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Start from this node instead of the workflow's triggers.
        #[arg(long)]
        start: Option<String>,
        #[command(flatten)]
        defaults: Defaults,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
}

/// Engine-wide fallbacks for nodes that leave a setting unset.
#[derive(Args)]
struct Defaults {
    #[arg(long, env = "FLOWRUN_DEFAULT_TIMEOUT_MS", default_value_t = 30_000)]
    default_timeout_ms: u64,
    #[arg(long, env = "FLOWRUN_DEFAULT_RETRIES", default_value_t = 0)]
    default_retries: u32,
    #[arg(long, env = "FLOWRUN_DEFAULT_RETRY_DELAY_MS", default_value_t = 0)]
    default_retry_delay_ms: u64,
}

impl From<Defaults> for EngineConfig {
    fn from(d: Defaults) -> Self {
        Self {
            default_timeout: Duration::from_millis(d.default_timeout_ms),
            default_retry_count: d.default_retries,
            default_retry_delay: Duration::from_millis(d.default_retry_delay_ms),
            ..Self::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { path, start, defaults } => run(&path, start.as_deref(), defaults.into()).await,
        Command::Validate { path } => validate(&path),
    }
}

fn load(path: &Path) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid workflow JSON in {}", path.display()))
}

async fn run(path: &Path, start: Option<&str>, config: EngineConfig) -> Result<ExitCode> {
    let workflow = load(path)?;
    let engine = Arc::new(WorkflowEngine::new(NodeRegistry::with_builtins(), config));

    let stopper = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping workflow");
                engine.stop();
            }
        })
    };

    info!(workflow_id = %workflow.id, "running workflow");
    let run = engine.execute(&workflow, start).await;
    stopper.abort();

    println!("{}", serde_json::to_string_pretty(&run).context("cannot serialize run")?);

    Ok(if run.status == RunStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate(path: &Path) -> Result<ExitCode> {
    let workflow = load(path)?;
    let engine = WorkflowEngine::with_builtins();

    match engine.validate(&workflow) {
        Ok(()) => {
            println!("Workflow '{}' is valid", workflow.name);
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => {
            eprintln!("Validation failed:");
            for err in errors {
                eprintln!("  - {err}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
