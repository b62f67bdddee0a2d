//! sitewright CLI binary
//!
//! Loads a task descriptor, wires the LLM router and collaborators from
//! configuration, runs the task through the pipeline, and prints the final
//! report as JSON. The inbound web-API layer lives outside this binary.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use sitewright::collab::{HttpGenerator, HttpHost};
use sitewright::config::Config;
use sitewright::eval::HeadlessEvaluator;
use sitewright::llm::LlmRouter;
use sitewright::pipeline::Orchestrator;
use sitewright::types::{Report, Task, TaskStatus};

/// sitewright - autonomous web-development task pipeline
#[derive(Parser)]
#[command(name = "sitewright")]
#[command(about = "Process a web-development task: analyze, plan, build, deploy, and score it")]
#[command(version)]
struct Cli {
    /// Path to the task descriptor JSON file
    task: PathBuf,

    /// Path to a configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = sitewright::logging::init_tracing(cli.verbose) {
        eprintln!("failed to initialize logging: {e}");
    }

    let config = Config::load(cli.config.as_deref())?;

    let raw_task = std::fs::read_to_string(&cli.task)
        .with_context(|| format!("failed to read task file {}", cli.task.display()))?;
    let task: Task = serde_json::from_str(&raw_task)
        .with_context(|| format!("invalid task descriptor {}", cli.task.display()))?;

    let orchestrator = build_orchestrator(&config)?;

    match orchestrator.process_task(&task).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!(task_id = %task.task_id, error = %e, "task failed");
            let report = Report {
                task_id: task.task_id.clone(),
                status: TaskStatus::Failed,
                deployment: None,
                score: 0.0,
                checks_passed: Vec::new(),
                checks_failed: task.checks.clone(),
                recommendations: vec![format!("Task failed: {e}")],
                completed_at: chrono::Utc::now(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            std::process::exit(1);
        }
    }
}

fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let router = LlmRouter::from_config(config);

    let generator_url = config
        .collab
        .generator_url
        .as_deref()
        .context("collab.generator_url is not configured")?;
    let host_url = config
        .collab
        .host_url
        .as_deref()
        .context("collab.host_url is not configured")?;

    let generator = Arc::new(HttpGenerator::new(generator_url)?);
    let host = Arc::new(HttpHost::new(host_url)?);

    let evaluator = match config.eval.settle_delay_ms {
        Some(ms) => HeadlessEvaluator::with_settle_delay(Duration::from_millis(ms)),
        None => HeadlessEvaluator::new(),
    };

    let mut orchestrator = Orchestrator::new(
        router,
        generator,
        host.clone(),
        host,
        Arc::new(evaluator),
    );
    if let Some(secs) = config.eval.navigation_timeout_secs {
        orchestrator = orchestrator.with_navigation_timeout(Duration::from_secs(secs));
    }
    Ok(orchestrator)
}
