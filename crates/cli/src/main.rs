//! `triage`: diagnose one workflow failure from the command line.
//!
//! Reads a stack trace plus optional workflow/environment/log files, runs
//! the curation pipeline, and prints the LLM-ready bundle together with a
//! diagnosis report as JSON. A failed pipeline still prints its partial
//! results; only the exit code changes.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use triage_budget::{BudgetConfig, BudgetPolicy};
use triage_pipeline::{AnalysisContext, Pipeline, PipelineStatus, RequestSettings};
use triage_protocol::{
    EnvironmentInfo, MemoryLogSource, PassthroughSanitizer, WorkflowGraph,
};

#[derive(Parser, Debug)]
#[command(
    name = "triage",
    version,
    about = "Turn a raw failure into a budgeted, LLM-ready context bundle"
)]
struct Args {
    /// Stack trace file.
    #[arg(long)]
    trace: PathBuf,

    /// Workflow export (JSON, node-id → node map).
    #[arg(long)]
    workflow: Option<PathBuf>,

    /// Environment snapshot (JSON).
    #[arg(long)]
    environment: Option<PathBuf>,

    /// Recent log lines, one per line.
    #[arg(long)]
    logs: Option<PathBuf>,

    /// Failing node id, when the editor reported one.
    #[arg(long)]
    node_id: Option<String>,

    /// Model family for token estimation.
    #[arg(long, default_value = "gpt-4")]
    model: String,

    /// Soft token ceiling.
    #[arg(long, default_value_t = 6_000)]
    soft_max_tokens: usize,

    /// Hard token ceiling.
    #[arg(long, default_value_t = 8_000)]
    hard_max_tokens: usize,

    /// Enforce only the soft ceiling (local provider).
    #[arg(long)]
    local: bool,

    /// Skip budget enforcement entirely.
    #[arg(long)]
    no_budget: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();

    let trace = read_text(&args.trace)?;
    let workflow: Option<WorkflowGraph> = read_json(args.workflow.as_deref())?;
    let environment: Option<EnvironmentInfo> = read_json(args.environment.as_deref())?;
    log::debug!(
        "inputs: trace {} chars, workflow {} nodes",
        trace.chars().count(),
        workflow.as_ref().map_or(0, WorkflowGraph::len)
    );

    let log_source = Arc::new(load_logs(args.logs.as_deref())?);
    let settings = RequestSettings {
        model_family: args.model.clone(),
        error_node_id: args.node_id.clone(),
        budget: BudgetConfig {
            enabled: !args.no_budget,
            policy: if args.local {
                BudgetPolicy::LocalSoft
            } else {
                BudgetPolicy::RemoteStrict
            },
            soft_max_tokens: args.soft_max_tokens,
            hard_max_tokens: args.hard_max_tokens,
            ..Default::default()
        },
        ..Default::default()
    };

    let pipeline = Pipeline::standard(Arc::new(PassthroughSanitizer), log_source);
    let ctx = pipeline.run(AnalysisContext::new(trace, workflow, environment, settings));

    let output = json!({
        "bundle": ctx.bundle,
        "report": {
            "pipeline_status": ctx.status.as_str(),
            "error_summary": ctx.error_summary,
            "suggestion": ctx.suggestion,
            "stage_errors": ctx.stage_errors,
            "metadata": ctx.metadata,
        },
    });
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(match ctx.status {
        PipelineStatus::Ok | PipelineStatus::Degraded => ExitCode::SUCCESS,
        PipelineStatus::Failed => ExitCode::from(1),
    })
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: Option<&Path>) -> Result<Option<T>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = read_text(path)?;
    let value =
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(Some(value))
}

fn load_logs(path: Option<&Path>) -> Result<MemoryLogSource> {
    let Some(path) = path else {
        return Ok(MemoryLogSource::new(1));
    };
    let raw = read_text(path)?;
    let lines: Vec<&str> = raw.lines().collect();
    let source = MemoryLogSource::new(lines.len().max(1));
    for line in lines {
        source.push(line);
    }
    Ok(source)
}
