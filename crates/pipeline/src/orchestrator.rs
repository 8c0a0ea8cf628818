use crate::context::{AnalysisContext, StageFailure};
use crate::metadata::validate_metadata;
use crate::stage::Stage;
use crate::stages::{
    BuildContextStage, ClassifyStage, NodeContextStage, SanitizeStage, TokenBudgetStage,
};
use serde_json::json;
use std::sync::Arc;
use triage_protocol::{LogSource, Sanitizer};

/// Runs an ordered stage list over one context.
///
/// The order is caller-supplied and fixed; no stage may reorder or skip
/// another. The orchestrator owns the context for the duration of the run
/// and hands it back whole: failure shows up as status flags and stage
/// records, never as an early return.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// The standard five-stage diagnosis pipeline.
    pub fn standard(sanitizer: Arc<dyn Sanitizer>, log_source: Arc<dyn LogSource>) -> Self {
        Self::new(vec![
            Box::new(SanitizeStage::new(sanitizer.clone())),
            Box::new(ClassifyStage::default()),
            Box::new(NodeContextStage),
            Box::new(BuildContextStage::new(log_source, sanitizer)),
            Box::new(TokenBudgetStage),
        ])
    }

    pub fn stage_ids(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.id()).collect()
    }

    /// Run every stage in order, then validate metadata exactly once.
    pub fn run(&self, mut ctx: AnalysisContext) -> AnalysisContext {
        for stage in &self.stages {
            let missing: Vec<String> = stage
                .requires()
                .iter()
                .filter(|requirement| !ctx.requirement_satisfied(requirement))
                .map(|requirement| requirement.to_string())
                .collect();

            if !missing.is_empty() {
                log::debug!(
                    "stage '{}' skipped; unmet requirements: {}",
                    stage.id(),
                    missing.join(", ")
                );
                record_failure(
                    &mut ctx,
                    StageFailure::Skipped {
                        stage_id: stage.id().to_string(),
                        missing,
                    },
                );
                ctx.degrade();
                continue;
            }

            if let Err(err) = stage.process(&mut ctx) {
                log::warn!("stage '{}' failed: {err}", stage.id());
                record_failure(
                    &mut ctx,
                    StageFailure::Failed {
                        stage_id: stage.id().to_string(),
                        message: err.to_string(),
                    },
                );
                ctx.fail();
                // Fail-safe contract: the next stage still runs.
            }
        }

        ctx.metadata.insert(
            "pipeline_status".to_string(),
            json!(ctx.status.as_str()),
        );
        validate_metadata(&mut ctx.metadata);
        ctx
    }
}

fn record_failure(ctx: &mut AnalysisContext, failure: StageFailure) {
    let stage_id = match &failure {
        StageFailure::Skipped { stage_id, .. } | StageFailure::Failed { stage_id, .. } => {
            stage_id.clone()
        }
    };
    if let Ok(value) = serde_json::to_value(&failure) {
        ctx.metadata.insert(format!("stage_error_{stage_id}"), value);
    }
    ctx.stage_errors.push(failure);
}
