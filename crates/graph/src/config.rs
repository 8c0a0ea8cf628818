use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use triage_protocol::{NodeId, WorkflowGraph};

/// Traversal limits for one prune call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneConfig {
    /// Maximum upstream distance from the target; the target itself is
    /// depth 0.
    pub max_depth: usize,

    /// Hard cap on kept nodes, target included.
    pub max_nodes: usize,

    /// How many nodes (by id sort order, from the end) to keep when the
    /// target is absent from the graph.
    pub fallback_recent_nodes: usize,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_nodes: 50,
            fallback_recent_nodes: 15,
        }
    }
}

impl PruneConfig {
    /// Tighter tier derived from this one: one level shallower, half the
    /// nodes. Floors at depth 1 / one node.
    pub fn tightened(&self) -> Self {
        Self {
            max_depth: self.max_depth.saturating_sub(1).max(1),
            max_nodes: (self.max_nodes / 2).max(1),
            fallback_recent_nodes: self.fallback_recent_nodes,
        }
    }
}

/// Which path the pruner took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneMode {
    /// Target found; result is its bounded ancestor subgraph.
    UpstreamTrace,
    /// Target absent; result is the most recent nodes by id order.
    FallbackRecentNodes,
}

/// Outcome of one prune call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneResult {
    pub mode: PruneMode,

    /// Kept node ids; sorted by construction.
    pub kept: BTreeSet<NodeId>,

    /// Nodes of the input graph not present in the subgraph.
    pub dropped: usize,

    /// Induced subgraph over `kept`; a new copy, never a view.
    pub graph: WorkflowGraph,
}
