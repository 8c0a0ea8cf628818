use crate::config::{PruneConfig, PruneMode, PruneResult};
use std::collections::{BTreeSet, VecDeque};
use triage_protocol::{NodeId, WorkflowGraph};

/// Prune `graph` to the bounded upstream ancestry of `target`.
///
/// Never fails: a target absent from the graph switches to fallback mode
/// instead. The input graph is not mutated; the result carries a new
/// induced copy. Identical `(graph, target, config)` inputs produce
/// identical results.
pub fn prune(graph: &WorkflowGraph, target: &str, config: &PruneConfig) -> PruneResult {
    if !graph.contains(target) {
        return fallback(graph, target, config);
    }

    let max_nodes = config.max_nodes.max(1);
    let mut kept: BTreeSet<NodeId> = BTreeSet::new();
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();

    kept.insert(target.to_string());
    queue.push_back((target.to_string(), 0));

    while let Some((id, depth)) = queue.pop_front() {
        // Both limits are hard cutoffs, checked before each expansion.
        if depth >= config.max_depth || kept.len() >= max_nodes {
            continue;
        }
        let Some(node) = graph.get(&id) else {
            continue;
        };
        // Input references iterate in sorted input-name order (BTreeMap),
        // never insertion order, so ties break the same way on every run.
        for upstream in node.upstream_ids() {
            if kept.len() >= max_nodes {
                break;
            }
            if !graph.contains(upstream) || kept.contains(upstream) {
                continue;
            }
            kept.insert(upstream.to_string());
            queue.push_back((upstream.to_string(), depth + 1));
        }
    }

    let subgraph = graph.restricted_to(kept.iter().map(String::as_str));
    PruneResult {
        mode: PruneMode::UpstreamTrace,
        dropped: graph.len() - kept.len(),
        kept,
        graph: subgraph,
    }
}

/// Target not found: keep the last `fallback_recent_nodes` ids in sort
/// order. The editor assigns ids monotonically, so the tail of the sort
/// order is the most recently added part of the workflow.
fn fallback(graph: &WorkflowGraph, target: &str, config: &PruneConfig) -> PruneResult {
    log::debug!(
        "prune target '{target}' not in graph ({} nodes); keeping up to {} recent nodes",
        graph.len(),
        config.fallback_recent_nodes
    );

    let ids: Vec<&str> = graph.node_ids().collect();
    let keep_from = ids.len().saturating_sub(config.fallback_recent_nodes);
    let kept: BTreeSet<NodeId> = ids[keep_from..].iter().map(|id| id.to_string()).collect();

    let subgraph = graph.restricted_to(kept.iter().map(String::as_str));
    PruneResult {
        mode: PruneMode::FallbackRecentNodes,
        dropped: graph.len() - kept.len(),
        kept,
        graph: subgraph,
    }
}
