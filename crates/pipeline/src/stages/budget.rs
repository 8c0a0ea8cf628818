use crate::context::AnalysisContext;
use crate::error::{Result, StageError};
use crate::stage::Stage;
use serde_json::json;
use triage_budget::{enforce, DiagnosticPayload, EstimatorConfig, TokenEstimator};

/// Runs the budget-enforcement loop over the assembled bundle.
///
/// The full workflow export rides along in the payload so the pruning
/// tiers re-prune from the source rather than shaving the already-pruned
/// subset.
pub struct TokenBudgetStage;

impl Stage for TokenBudgetStage {
    fn id(&self) -> &'static str {
        "enforce.budget"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["bundle"]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[
            "metadata.budget_steps",
            "metadata.estimated_tokens",
            "metadata.budget_degraded",
        ]
    }

    fn process(&self, ctx: &mut AnalysisContext) -> Result<()> {
        let bundle = ctx
            .bundle
            .clone()
            .ok_or(StageError::MissingInput("bundle"))?;
        let target = ctx
            .node_context
            .as_ref()
            .and_then(|node| node.node_id.clone());
        let payload = DiagnosticPayload::from_bundle(bundle, ctx.raw_workflow.clone(), target);

        let estimator = TokenEstimator::new(EstimatorConfig {
            model_family: ctx.settings.model_family.clone(),
            ..Default::default()
        });
        let outcome = enforce(&payload, &ctx.settings.budget, &estimator);

        ctx.metadata.insert(
            "budget_steps".to_string(),
            serde_json::to_value(&outcome.steps)?,
        );
        ctx.metadata.insert(
            "estimated_tokens".to_string(),
            json!(outcome.estimated_tokens_final),
        );
        if outcome.degraded {
            ctx.metadata
                .insert("budget_degraded".to_string(), json!(true));
            ctx.degrade();
        }

        ctx.bundle = Some(outcome.payload.into_bundle());
        Ok(())
    }
}
