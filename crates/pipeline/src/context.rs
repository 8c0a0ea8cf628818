use crate::matchers::Suggestion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use triage_budget::BudgetConfig;
use triage_protocol::{
    EnvironmentInfo, LlmContextBundle, NodeContext, PrivacyLevel, WorkflowGraph,
};

/// Per-request knobs, fixed for the lifetime of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSettings {
    pub privacy_level: PrivacyLevel,

    /// Declared model family; drives the token estimator's encoding
    /// profile.
    pub model_family: String,

    /// Budget ceilings and trimming tiers. `budget.prune` doubles as the
    /// standard pruning tier used at assembly time.
    pub budget: BudgetConfig,

    /// Failing node id as reported by the host editor, when it knows.
    pub error_node_id: Option<String>,

    /// Recent log lines to pull from the log source.
    pub log_window: usize,

    /// Cap on the canonical package list.
    pub max_packages: usize,

    /// Trace collapsing window: verbatim head/tail frame counts.
    pub collapse_head: usize,
    pub collapse_tail: usize,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            privacy_level: PrivacyLevel::Standard,
            model_family: "gpt-4".to_string(),
            budget: BudgetConfig::default(),
            error_node_id: None,
            log_window: 30,
            max_packages: 20,
            collapse_head: 6,
            collapse_tail: 14,
        }
    }
}

/// Overall outcome of a pipeline run. Only ever downgraded, never back up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Ok,
    Degraded,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

/// One entry of the stage-error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StageFailure {
    /// Requirements unmet; the stage did not run.
    Skipped {
        stage_id: String,
        missing: Vec<String>,
    },
    /// The stage ran and returned an error.
    Failed { stage_id: String, message: String },
}

/// The mutable record threaded through every stage of one run.
///
/// Inputs are set at construction and never rewritten; each stage appends
/// its outputs. Trust is one-directional: a stage may read what earlier
/// stages produced but never re-validates it.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    // Immutable inputs.
    pub raw_trace: String,
    pub raw_workflow: Option<WorkflowGraph>,
    pub environment: Option<EnvironmentInfo>,
    pub settings: RequestSettings,

    // Stage-populated outputs.
    pub sanitized_trace: Option<String>,
    pub suggestion: Option<Suggestion>,
    pub node_context: Option<NodeContext>,
    pub error_summary: Option<String>,
    pub log_lines: Vec<String>,
    pub bundle: Option<LlmContextBundle>,
    pub metadata: BTreeMap<String, Value>,
    pub stage_errors: Vec<StageFailure>,
    pub status: PipelineStatus,
}

impl AnalysisContext {
    pub fn new(
        raw_trace: impl Into<String>,
        raw_workflow: Option<WorkflowGraph>,
        environment: Option<EnvironmentInfo>,
        settings: RequestSettings,
    ) -> Self {
        Self {
            raw_trace: raw_trace.into(),
            raw_workflow,
            environment,
            settings,
            sanitized_trace: None,
            suggestion: None,
            node_context: None,
            error_summary: None,
            log_lines: Vec::new(),
            bundle: None,
            metadata: BTreeMap::new(),
            stage_errors: Vec::new(),
            status: PipelineStatus::Ok,
        }
    }

    /// `ok → degraded`; an already failed run stays failed.
    pub fn degrade(&mut self) {
        if self.status == PipelineStatus::Ok {
            self.status = PipelineStatus::Degraded;
        }
    }

    pub fn fail(&mut self) {
        self.status = PipelineStatus::Failed;
    }

    /// Resolve one requirement: `a|b` alternatives, each a bare context
    /// field or a `metadata.<key>` path; satisfied if any alternative is
    /// present and non-empty.
    pub fn requirement_satisfied(&self, requirement: &str) -> bool {
        requirement
            .split('|')
            .any(|alternative| self.path_present(alternative.trim()))
    }

    fn path_present(&self, path: &str) -> bool {
        if let Some(key) = path.strip_prefix("metadata.") {
            return self.metadata.get(key).is_some_and(value_non_empty);
        }
        match path {
            "raw_trace" => !self.raw_trace.is_empty(),
            "raw_workflow" => self.raw_workflow.as_ref().is_some_and(|g| !g.is_empty()),
            "environment" => self.environment.is_some(),
            "settings" => true,
            "sanitized_trace" => self
                .sanitized_trace
                .as_deref()
                .is_some_and(|t| !t.is_empty()),
            "suggestion" => self.suggestion.is_some(),
            "node_context" => self.node_context.as_ref().is_some_and(NodeContext::is_valid),
            "error_summary" => self.error_summary.as_deref().is_some_and(|s| !s.is_empty()),
            "log_lines" => !self.log_lines.is_empty(),
            "bundle" => self.bundle.is_some(),
            _ => false,
        }
    }
}

fn value_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> AnalysisContext {
        AnalysisContext::new("trace", None, None, RequestSettings::default())
    }

    #[test]
    fn alternatives_satisfy_left_to_right() {
        let mut ctx = ctx();
        assert!(ctx.requirement_satisfied("sanitized_trace|raw_trace"));
        ctx.raw_trace.clear();
        assert!(!ctx.requirement_satisfied("sanitized_trace|raw_trace"));
        ctx.sanitized_trace = Some("clean".to_string());
        assert!(ctx.requirement_satisfied("sanitized_trace|raw_trace"));
    }

    #[test]
    fn metadata_paths_must_be_non_empty() {
        let mut ctx = ctx();
        assert!(!ctx.requirement_satisfied("metadata.pattern_matched"));
        ctx.metadata.insert("pattern_matched".to_string(), json!(""));
        assert!(!ctx.requirement_satisfied("metadata.pattern_matched"));
        ctx.metadata
            .insert("pattern_matched".to_string(), json!("oom"));
        assert!(ctx.requirement_satisfied("metadata.pattern_matched"));
    }

    #[test]
    fn unknown_paths_are_never_satisfied() {
        assert!(!ctx().requirement_satisfied("no_such_field"));
    }

    #[test]
    fn empty_node_context_does_not_satisfy() {
        let mut ctx = ctx();
        ctx.node_context = Some(NodeContext::default());
        assert!(!ctx.requirement_satisfied("node_context"));
        ctx.node_context = Some(NodeContext {
            node_id: Some("4".to_string()),
            ..Default::default()
        });
        assert!(ctx.requirement_satisfied("node_context"));
    }

    #[test]
    fn status_only_moves_downward() {
        let mut ctx = ctx();
        ctx.degrade();
        assert_eq!(ctx.status, PipelineStatus::Degraded);
        ctx.fail();
        assert_eq!(ctx.status, PipelineStatus::Failed);
        ctx.degrade();
        assert_eq!(ctx.status, PipelineStatus::Failed, "failed is terminal");
    }
}
