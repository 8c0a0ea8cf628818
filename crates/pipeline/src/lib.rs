//! # Triage Pipeline
//!
//! The context curation pipeline: an ordered list of declaratively-gated
//! stages run over one mutable analysis context, turning a raw trace plus a
//! noisy workflow export into a budgeted, privacy-safe bundle.
//!
//! ```text
//! AnalysisContext (raw trace, workflow export, environment, settings)
//!     │
//!     ├─ sanitize.trace ──────── PII collaborator, once, up front
//!     ├─ classify.pattern ────── matcher registry → suggestion
//!     ├─ extract.node_context ── trace markers + workflow lookup
//!     ├─ build.context ───────── summary, collapsed trace, logs,
//!     │                          pruned workflow, canonical system info
//!     └─ enforce.budget ──────── ordered trimming loop over the bundle
//!     │
//!     └─> metadata contract validation (exactly once) → caller
//! ```
//!
//! Failure is data: a stage with unmet requirements is skipped and recorded,
//! a stage error is recorded and the next stage still runs, and the caller
//! always gets the context back with whatever the earlier stages produced.

mod context;
mod error;
mod matchers;
mod metadata;
mod orchestrator;
mod stage;
pub mod stages;

pub use context::{AnalysisContext, PipelineStatus, RequestSettings, StageFailure};
pub use error::{Result, StageError};
pub use matchers::{
    install_registry, registry, reset_registry, MatcherFn, MatcherRegistry, Suggestion,
};
pub use metadata::validate_metadata;
pub use orchestrator::Pipeline;
pub use stage::Stage;
