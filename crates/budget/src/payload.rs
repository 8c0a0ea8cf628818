use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use triage_protocol::{LlmContextBundle, NodeContext, NodeId, SystemInfo, WorkflowGraph};

/// The composite payload the budget loop trims.
///
/// A superset of [`LlmContextBundle`]: it also carries the source workflow
/// and target node id so the pruning tiers can re-prune from the full
/// export instead of shrinking an already-pruned subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticPayload {
    pub error_summary: String,
    pub node_info: Option<NodeContext>,
    pub traceback: String,
    pub execution_logs: Vec<String>,
    pub workflow_subset: Option<WorkflowGraph>,
    pub system_info: Option<SystemInfo>,

    /// Full workflow export; input to the pruning tiers, never emitted.
    #[serde(skip)]
    pub source_workflow: Option<WorkflowGraph>,

    /// Prune target; usually the failing node's id.
    #[serde(skip)]
    pub target_node_id: Option<NodeId>,
}

impl DiagnosticPayload {
    /// Wrap an assembled bundle together with its pruning inputs.
    pub fn from_bundle(
        bundle: LlmContextBundle,
        source_workflow: Option<WorkflowGraph>,
        target_node_id: Option<NodeId>,
    ) -> Self {
        Self {
            error_summary: bundle.error_summary,
            node_info: bundle.node_info,
            traceback: bundle.traceback,
            execution_logs: bundle.execution_logs,
            workflow_subset: bundle.workflow_subset,
            system_info: bundle.system_info,
            source_workflow,
            target_node_id,
        }
    }

    /// Shed the pruning inputs, leaving the outbound bundle.
    pub fn into_bundle(self) -> LlmContextBundle {
        LlmContextBundle {
            error_summary: self.error_summary,
            node_info: self.node_info,
            traceback: self.traceback,
            execution_logs: self.execution_logs,
            workflow_subset: self.workflow_subset,
            system_info: self.system_info,
        }
    }

    /// Section name → serialized text, the unit the estimator works on.
    ///
    /// Absent sections contribute empty text rather than disappearing, so
    /// step histories always break down over the same section names.
    pub fn section_texts(&self) -> BTreeMap<String, String> {
        fn json_or_empty<T: Serialize>(value: &Option<T>) -> String {
            value
                .as_ref()
                .and_then(|v| serde_json::to_string(v).ok())
                .unwrap_or_default()
        }

        BTreeMap::from([
            ("error_summary".to_string(), self.error_summary.clone()),
            ("node_info".to_string(), json_or_empty(&self.node_info)),
            ("traceback".to_string(), self.traceback.clone()),
            (
                "execution_logs".to_string(),
                serde_json::to_string(&self.execution_logs).unwrap_or_default(),
            ),
            (
                "workflow_subset".to_string(),
                json_or_empty(&self.workflow_subset),
            ),
            ("system_info".to_string(), json_or_empty(&self.system_info)),
        ])
    }
}
