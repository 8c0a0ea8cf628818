use crate::estimator::TokenEstimator;
use crate::payload::DiagnosticPayload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use triage_graph::{prune, PruneConfig};

/// Verbatim head kept when the trace is truncated: the banner line plus the
/// first frame.
const TRACE_HEAD_LINES: usize = 2;

/// The last-resort pruning tier.
const MINIMAL_PRUNE: PruneConfig = PruneConfig {
    max_depth: 1,
    max_nodes: 10,
    fallback_recent_nodes: 10,
};

/// Which ceiling is binding for this provider class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPolicy {
    /// Remote call: the hard ceiling must hold.
    RemoteStrict,
    /// Local model: the soft ceiling is a preference, not a contract.
    LocalSoft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Budgeting can be disabled wholesale for a provider class.
    pub enabled: bool,
    pub policy: BudgetPolicy,
    pub soft_max_tokens: usize,
    pub hard_max_tokens: usize,

    /// Fixed reserve for the prompt scaffolding around the payload.
    pub overhead_tokens: usize,

    /// Standard pruning tier; the aggressive tier derives from it.
    pub prune: PruneConfig,

    /// Tail lines kept by the trace truncation action.
    pub truncate_tail_lines: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: BudgetPolicy::RemoteStrict,
            soft_max_tokens: 6_000,
            hard_max_tokens: 8_000,
            overhead_tokens: 800,
            prune: PruneConfig::default(),
            truncate_tail_lines: 40,
        }
    }
}

impl BudgetConfig {
    /// The limit the trimming loop must satisfy under this policy.
    pub fn effective_limit(&self) -> usize {
        match self.policy {
            BudgetPolicy::RemoteStrict => self.hard_max_tokens,
            BudgetPolicy::LocalSoft => self.soft_max_tokens,
        }
    }
}

/// One entry of the step history: the action taken and where it left the
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStep {
    pub action: String,
    pub total_tokens: usize,

    /// Per-section token counts after this action.
    pub sections: BTreeMap<String, usize>,
}

/// Result of one enforcement call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetOutcome {
    pub payload: DiagnosticPayload,

    /// Ordered history; the first entry is always `initial` unless
    /// budgeting was disabled.
    pub steps: Vec<BudgetStep>,

    /// The last recorded step's total; 0 when budgeting was disabled and
    /// nothing was estimated.
    pub estimated_tokens_final: usize,

    /// True when every action was exhausted and the payload is still over
    /// the effective limit. The caller decides whether to send anyway,
    /// truncate further, or abort.
    pub degraded: bool,
}

/// The fixed, priority-ordered trimming ladder. Cheap, high-signal
/// sections are sacrificed last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrimAction {
    PruneStandard,
    PruneAggressive,
    PruneMinimal,
    DropEnvironment,
    TruncateTrace,
}

impl TrimAction {
    const ORDER: [TrimAction; 5] = [
        TrimAction::PruneStandard,
        TrimAction::PruneAggressive,
        TrimAction::PruneMinimal,
        TrimAction::DropEnvironment,
        TrimAction::TruncateTrace,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::PruneStandard => "prune_workflow_standard",
            Self::PruneAggressive => "prune_workflow_aggressive",
            Self::PruneMinimal => "prune_workflow_minimal",
            Self::DropEnvironment => "drop_environment_info",
            Self::TruncateTrace => "truncate_trace",
        }
    }

    /// Mutate the payload; false means the action did not apply (missing
    /// graph, nothing left to drop) and the loop moves on.
    fn apply(self, payload: &mut DiagnosticPayload, config: &BudgetConfig) -> bool {
        match self {
            Self::PruneStandard => reprune(payload, &config.prune),
            Self::PruneAggressive => reprune(payload, &config.prune.tightened()),
            Self::PruneMinimal => reprune(payload, &MINIMAL_PRUNE),
            Self::DropEnvironment => {
                if payload.system_info.is_none() {
                    return false;
                }
                payload.system_info = None;
                true
            }
            Self::TruncateTrace => truncate_trace(payload, config.truncate_tail_lines),
        }
    }
}

fn reprune(payload: &mut DiagnosticPayload, tier: &PruneConfig) -> bool {
    let Some(graph) = payload.source_workflow.as_ref() else {
        return false;
    };
    let Some(target) = payload.target_node_id.as_deref() else {
        return false;
    };
    if graph.is_empty() {
        return false;
    }
    payload.workflow_subset = Some(prune(graph, target, tier).graph);
    true
}

fn truncate_trace(payload: &mut DiagnosticPayload, tail_lines: usize) -> bool {
    let lines: Vec<&str> = payload.traceback.lines().collect();
    if lines.len() <= TRACE_HEAD_LINES + tail_lines {
        return false;
    }

    let omitted = lines.len() - TRACE_HEAD_LINES - tail_lines;
    let mut kept: Vec<String> = Vec::with_capacity(TRACE_HEAD_LINES + tail_lines + 1);
    kept.extend(lines[..TRACE_HEAD_LINES].iter().map(|l| l.to_string()));
    kept.push(format!("... ({omitted} lines omitted) ..."));
    kept.extend(lines[lines.len() - tail_lines..].iter().map(|l| l.to_string()));
    payload.traceback = kept.join("\n");
    true
}

/// Trim `payload` until it fits the effective limit, or every action is
/// spent.
///
/// Works on a private copy; the caller's payload is never mutated. Applied
/// actions are never undone within a call, and no per-action improvement is
/// assumed: the loop always tries the next action while still over the
/// limit.
pub fn enforce(
    payload: &DiagnosticPayload,
    config: &BudgetConfig,
    estimator: &TokenEstimator,
) -> BudgetOutcome {
    let mut payload = payload.clone();

    if !config.enabled {
        return BudgetOutcome {
            payload,
            steps: Vec::new(),
            estimated_tokens_final: 0,
            degraded: false,
        };
    }

    let mut steps = Vec::new();
    let mut total = record_step(&payload, "initial", config, estimator, &mut steps);

    if total <= config.soft_max_tokens {
        return BudgetOutcome {
            payload,
            estimated_tokens_final: total,
            steps,
            degraded: false,
        };
    }

    let limit = config.effective_limit();
    for action in TrimAction::ORDER {
        if total <= limit {
            break;
        }
        if !action.apply(&mut payload, config) {
            log::debug!("budget action {} not applicable; moving on", action.name());
            continue;
        }
        total = record_step(&payload, action.name(), config, estimator, &mut steps);
    }

    let degraded = total > limit;
    if degraded {
        log::warn!("trimming exhausted at {total} tokens, limit {limit}; payload marked degraded");
    }

    BudgetOutcome {
        payload,
        steps,
        estimated_tokens_final: total,
        degraded,
    }
}

fn record_step(
    payload: &DiagnosticPayload,
    action: &str,
    config: &BudgetConfig,
    estimator: &TokenEstimator,
    steps: &mut Vec<BudgetStep>,
) -> usize {
    let estimates = estimator.estimate_section_map(&payload.section_texts());
    let sections: BTreeMap<String, usize> = estimates
        .iter()
        .map(|(name, estimate)| (name.clone(), estimate.tokens))
        .collect();
    let total = sections.values().sum::<usize>() + config.overhead_tokens;
    steps.push(BudgetStep {
        action: action.to_string(),
        total_tokens: total,
        sections,
    });
    total
}
