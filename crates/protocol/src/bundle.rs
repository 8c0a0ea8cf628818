use crate::{NodeContext, SystemInfo, WorkflowGraph};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The LLM-ready bundle handed to the prompt formatter.
///
/// Fixed shape: all six keys are always present (absent sections serialize
/// as `null`), so downstream consumers never branch on key existence.
/// Sections are ordered summary-first because the summary is the cheapest,
/// highest-signal field for truncation-tolerant consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LlmContextBundle {
    /// `ExceptionType: message`, capped at 200 characters.
    pub error_summary: String,

    /// Where in the workflow the failure happened, if recovered.
    pub node_info: Option<NodeContext>,

    /// Sanitized, possibly collapsed stack trace.
    pub traceback: String,

    /// Recent log lines, oldest first, sanitized at read time.
    pub execution_logs: Vec<String>,

    /// Pruned ancestor subgraph around the failing node.
    pub workflow_subset: Option<WorkflowGraph>,

    /// Canonical environment info.
    pub system_info: Option<SystemInfo>,
}
