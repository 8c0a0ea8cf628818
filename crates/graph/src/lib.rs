//! # Triage Graph
//!
//! Workflow-graph pruning: reduce a large exported graph to the minimal
//! connected ancestor subgraph of a failing node, under hard depth and size
//! limits.
//!
//! ```text
//! WorkflowGraph + target id
//!     │
//!     ├──> upstream BFS (depth 0 at target)
//!     │      ├─ inputs visited in sorted input-name order
//!     │      ├─ depth < max_depth, kept < max_nodes (checked pre-expansion)
//!     │      └─ target always kept when present
//!     │
//!     └──> PruneResult
//!            ├─ mode: upstream_trace | fallback_recent_nodes
//!            ├─ kept id set + dropped count
//!            └─ induced subgraph (new copy, input untouched)
//! ```
//!
//! Determinism is part of the contract, not an optimization: the budget
//! loop re-prunes the same export at several tiers and relies on identical
//! inputs producing identical output.

mod config;
mod pruner;

pub use config::{PruneConfig, PruneMode, PruneResult};
pub use pruner::prune;
