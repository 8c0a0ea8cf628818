use crate::context::AnalysisContext;
use crate::error::{Result, StageError};
use crate::stage::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use triage_graph::prune;
use triage_protocol::{
    EnvironmentInfo, LlmContextBundle, LogSource, PackageInfo, Sanitizer, SystemInfo,
};

/// `ExceptionType: message`, the shape of a final exception line.
static SUMMARY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*:\s+.+$").expect("summary regex"));

const SUMMARY_MAX_CHARS: usize = 200;

/// Packages always worth a slot when installed, whatever the error says.
const BASELINE_PACKAGES: &[&str] = &[
    "torch",
    "torchvision",
    "numpy",
    "transformers",
    "safetensors",
    "pillow",
];

/// Assembles the LLM-ready bundle: summary, collapsed trace, sanitized log
/// window, pruned workflow, canonical system info, plus an observability
/// manifest in metadata.
pub struct BuildContextStage {
    log_source: Arc<dyn LogSource>,
    sanitizer: Arc<dyn Sanitizer>,
}

impl BuildContextStage {
    pub fn new(log_source: Arc<dyn LogSource>, sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self {
            log_source,
            sanitizer,
        }
    }
}

impl Stage for BuildContextStage {
    fn id(&self) -> &'static str {
        "build.context"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["sanitized_trace"]
    }

    fn provides(&self) -> &'static [&'static str] {
        &["bundle", "error_summary", "log_lines", "metadata.bundle_manifest"]
    }

    fn process(&self, ctx: &mut AnalysisContext) -> Result<()> {
        let trace = ctx
            .sanitized_trace
            .clone()
            .ok_or(StageError::MissingInput("sanitized_trace"))?;

        let summary = extract_summary(&trace);
        let collapsed = collapse_trace(&trace, ctx.settings.collapse_head, ctx.settings.collapse_tail);

        // Log lines are sanitized at read time, not at write time: the ring
        // buffer upstream holds raw text.
        let logs: Vec<String> = self
            .log_source
            .recent(ctx.settings.log_window)
            .iter()
            .map(|line| {
                self.sanitizer
                    .sanitize(line, ctx.settings.privacy_level)
                    .sanitized_text
            })
            .collect();

        let target = ctx
            .node_context
            .as_ref()
            .and_then(|node| node.node_id.clone());
        let prune_outcome = ctx
            .raw_workflow
            .as_ref()
            .filter(|graph| !graph.is_empty())
            .map(|graph| {
                // An empty id never appears in an export; passing it when no
                // node was located forces the pruner's fallback mode.
                prune(graph, target.as_deref().unwrap_or(""), &ctx.settings.budget.prune)
            });

        if let Some(result) = &prune_outcome {
            ctx.metadata
                .insert("prune_mode".to_string(), serde_json::to_value(result.mode)?);
            ctx.metadata
                .insert("prune_kept_nodes".to_string(), json!(result.kept.len()));
            ctx.metadata
                .insert("prune_dropped_nodes".to_string(), json!(result.dropped));
        }
        let workflow_subset = prune_outcome.map(|result| result.graph);

        let system_info = ctx
            .environment
            .as_ref()
            .map(|env| reduce_environment(env, &trace, ctx.settings.max_packages));

        ctx.metadata.insert(
            "bundle_manifest".to_string(),
            json!({
                "error_summary": {"chars": summary.chars().count()},
                "traceback": {
                    "chars": collapsed.chars().count(),
                    "lines": collapsed.lines().count(),
                },
                "execution_logs": {"lines": logs.len()},
                "workflow_subset": {
                    "nodes": workflow_subset.as_ref().map_or(0, |g| g.len()),
                },
                "system_info": {
                    "packages": system_info.as_ref().map_or(0, |s| s.packages.len()),
                },
            }),
        );

        ctx.error_summary = Some(summary.clone());
        ctx.log_lines = logs.clone();
        ctx.bundle = Some(LlmContextBundle {
            error_summary: summary,
            node_info: ctx.node_context.clone(),
            traceback: collapsed,
            execution_logs: logs,
            workflow_subset,
            system_info,
        });
        Ok(())
    }
}

/// Last `Identifier: message` line, scanning from the end; the last
/// non-empty line when nothing matches. Capped at 200 characters.
fn extract_summary(trace: &str) -> String {
    let line = trace
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| SUMMARY_LINE.is_match(line))
        .or_else(|| trace.lines().rev().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("");
    truncate_chars(line, SUMMARY_MAX_CHARS)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Keep `head` + `tail` lines verbatim and replace the middle with a single
/// omission marker. A trace that already fits is returned unchanged. The
/// tail window is floored at one line so the final exception line always
/// survives.
fn collapse_trace(trace: &str, head: usize, tail: usize) -> String {
    let tail = tail.max(1);
    let lines: Vec<&str> = trace.lines().collect();
    if lines.len() <= head + tail {
        return trace.to_string();
    }

    let omitted = lines.len() - head - tail;
    let mut kept: Vec<String> = lines[..head].iter().map(|l| l.to_string()).collect();
    kept.push(format!("... ({omitted} frames omitted) ..."));
    kept.extend(lines[lines.len() - tail..].iter().map(|l| l.to_string()));
    kept.join("\n")
}

/// Reduce the raw environment to the canonical shape: exact versions plus a
/// capped package list, ordered error-referenced → baseline → the rest.
fn reduce_environment(
    env: &EnvironmentInfo,
    error_text: &str,
    max_packages: usize,
) -> SystemInfo {
    let lower = error_text.to_ascii_lowercase();
    let mut packages: Vec<PackageInfo> = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    // Referenced in the error text first. Names under three characters
    // match almost anything, so they wait for the later tiers.
    for (name, version) in &env.packages {
        if name.len() >= 3 && lower.contains(&name.to_ascii_lowercase()) && seen.insert(name) {
            packages.push(PackageInfo {
                name: name.clone(),
                version: version.clone(),
            });
        }
    }

    for name in BASELINE_PACKAGES {
        if let Some(version) = env.packages.get(*name) {
            if seen.insert(name) {
                packages.push(PackageInfo {
                    name: (*name).to_string(),
                    version: version.clone(),
                });
            }
        }
    }

    for (name, version) in &env.packages {
        if seen.insert(name) {
            packages.push(PackageInfo {
                name: name.clone(),
                version: version.clone(),
            });
        }
    }

    packages.truncate(max_packages);
    SystemInfo {
        os: env.os.clone(),
        runtime_version: env.runtime_version.clone(),
        accelerator: env.accelerator.clone(),
        accelerator_version: env.accelerator_version.clone(),
        packages,
    }
}
