//! # Triage Protocol
//!
//! Wire contracts shared by every crate in the workspace: the workflow-graph
//! export consumed from the host editor, the node-location record, the
//! LLM-ready bundle handed to the prompt formatter, and the collaborator
//! traits the pipeline calls but does not implement.
//!
//! ```text
//! host editor ──workflow export──┐
//! process logs ──LogSource───────┤
//! stack trace ───────────────────┼──> curation pipeline ──> LlmContextBundle
//! PII rules ────Sanitizer────────┘
//! ```
//!
//! Everything here is plain data with deterministic iteration order:
//! node maps and input maps are `BTreeMap`s so that repeated runs over the
//! same export produce byte-identical output.

mod bundle;
mod collaborators;
mod node_context;
mod system;
mod workflow;

pub use bundle::LlmContextBundle;
pub use collaborators::{
    LogSource, MemoryLogSource, PassthroughSanitizer, SanitizeOutcome, Sanitizer,
};
pub use node_context::NodeContext;
pub use system::{EnvironmentInfo, PackageInfo, SystemInfo};
pub use workflow::{InputValue, NodeId, NodeLink, WorkflowGraph, WorkflowNode};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// How aggressively the sanitization collaborator rewrites text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    #[default]
    Standard,
    Strict,
}
