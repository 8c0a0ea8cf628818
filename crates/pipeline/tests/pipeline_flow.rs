//! End-to-end orchestration behavior: the standard pipeline over a real
//! failure, plus the fail-safe and requirement-gating contracts.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use triage_pipeline::{
    AnalysisContext, Pipeline, PipelineStatus, RequestSettings, Stage, StageError, StageFailure,
};
use triage_protocol::{
    EnvironmentInfo, MemoryLogSource, PassthroughSanitizer, WorkflowGraph,
};

fn sample_workflow() -> WorkflowGraph {
    serde_json::from_value(json!({
        "1": {"type": "CheckpointLoader", "inputs": {"ckpt_name": "model.safetensors"}},
        "2": {"type": "ClipEncode", "inputs": {"clip": ["1", 1], "text": "a cat"}},
        "3": {"type": "KSampler", "inputs": {"model": ["1", 0], "positive": ["2", 0]}},
        "4": {"type": "VaeDecode", "inputs": {"samples": ["3", 0], "vae": ["1", 2]}},
    }))
    .unwrap()
}

fn sample_trace() -> String {
    [
        "Error occurred when executing node 4 (VAE Decode)",
        "Traceback (most recent call last):",
        "  File \"nodes.py\", line 281, in decode",
        "    return vae.decode(samples)",
        "torch.cuda.OutOfMemoryError: CUDA out of memory. Tried to allocate 2.50 GiB",
    ]
    .join("\n")
}

#[test]
fn standard_pipeline_produces_a_complete_bundle() {
    std::env::remove_var(triage_budget::TOKENIZER_DIR_ENV);
    let logs = MemoryLogSource::new(16);
    logs.push("loading checkpoint model.safetensors");
    logs.push("executing node 4");

    let pipeline = Pipeline::standard(Arc::new(PassthroughSanitizer), Arc::new(logs));
    let ctx = AnalysisContext::new(
        sample_trace(),
        Some(sample_workflow()),
        Some(EnvironmentInfo {
            os: "Linux-6.8".to_string(),
            runtime_version: "3.12.4".to_string(),
            accelerator: Some("NVIDIA RTX 4090".to_string()),
            accelerator_version: Some("12.4".to_string()),
            packages: [("torch", "2.4.0"), ("numpy", "2.0.1")]
                .into_iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }),
        RequestSettings::default(),
    );

    let ctx = pipeline.run(ctx);

    assert_eq!(ctx.status, PipelineStatus::Ok);
    assert!(ctx.stage_errors.is_empty());

    let suggestion = ctx.suggestion.as_ref().expect("OOM pattern should match");
    assert_eq!(suggestion.pattern_id, "out_of_memory");

    let node = ctx.node_context.as_ref().expect("node 4 should be located");
    assert_eq!(node.node_id.as_deref(), Some("4"));
    assert_eq!(node.class_type.as_deref(), Some("VaeDecode"));

    let bundle = ctx.bundle.as_ref().expect("bundle must be assembled");
    assert!(bundle.error_summary.starts_with("torch.cuda.OutOfMemoryError:"));
    assert_eq!(bundle.execution_logs.len(), 2);
    let subset = bundle.workflow_subset.as_ref().unwrap();
    assert!(subset.contains("4"), "target node always kept");
    assert_eq!(
        bundle.system_info.as_ref().unwrap().packages[0].name,
        "torch",
        "torch is named in the error text"
    );

    assert_eq!(ctx.metadata["pipeline_status"], json!("ok"));
    assert_eq!(ctx.metadata["prune_mode"], json!("upstream_trace"));
    assert_eq!(
        ctx.metadata["budget_steps"].as_array().unwrap()[0]["action"],
        json!("initial")
    );
    assert!(
        !ctx.metadata.contains_key("_invalid"),
        "every first-party key satisfies the contract"
    );
}

struct ExplodingStage;

impl Stage for ExplodingStage {
    fn id(&self) -> &'static str {
        "test.explode"
    }

    fn process(&self, _ctx: &mut AnalysisContext) -> Result<(), StageError> {
        Err(StageError::Other("synthetic failure".to_string()))
    }
}

struct MarkerStage;

impl Stage for MarkerStage {
    fn id(&self) -> &'static str {
        "test.marker"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["metadata.pattern_matched"]
    }

    fn process(&self, ctx: &mut AnalysisContext) -> Result<(), StageError> {
        ctx.metadata
            .insert("pattern_matched".to_string(), json!("marker-ran"));
        Ok(())
    }
}

#[test]
fn stage_failure_does_not_stop_later_stages() {
    let pipeline = Pipeline::new(vec![Box::new(ExplodingStage), Box::new(MarkerStage)]);
    let ctx = pipeline.run(AnalysisContext::new(
        "trace",
        None,
        None,
        RequestSettings::default(),
    ));

    assert_eq!(ctx.status, PipelineStatus::Failed);
    assert_eq!(
        ctx.stage_errors,
        vec![StageFailure::Failed {
            stage_id: "test.explode".to_string(),
            message: "synthetic failure".to_string(),
        }]
    );
    assert_eq!(
        ctx.metadata["pattern_matched"],
        json!("marker-ran"),
        "the stage after the failure still ran"
    );
    assert_eq!(ctx.metadata["pipeline_status"], json!("failed"));
    assert!(
        ctx.metadata.contains_key("stage_error_test.explode"),
        "failure record mirrored into metadata"
    );
}

struct NeedsMissingInput;

impl Stage for NeedsMissingInput {
    fn id(&self) -> &'static str {
        "test.gated"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["metadata.never_set|node_context"]
    }

    fn process(&self, _ctx: &mut AnalysisContext) -> Result<(), StageError> {
        panic!("must not run with unmet requirements");
    }
}

#[test]
fn unmet_requirements_skip_the_stage_and_degrade() {
    let pipeline = Pipeline::new(vec![Box::new(NeedsMissingInput), Box::new(MarkerStage)]);
    let ctx = pipeline.run(AnalysisContext::new(
        "trace",
        None,
        None,
        RequestSettings::default(),
    ));

    assert_eq!(ctx.status, PipelineStatus::Degraded);
    assert_eq!(
        ctx.stage_errors,
        vec![StageFailure::Skipped {
            stage_id: "test.gated".to_string(),
            missing: vec!["metadata.never_set|node_context".to_string()],
        }]
    );
    assert_eq!(ctx.metadata["pattern_matched"], json!("marker-ran"));
    assert_eq!(ctx.metadata["pipeline_status"], json!("degraded"));
}

#[test]
fn empty_trace_skips_the_whole_chain_but_returns_a_context() {
    let pipeline = Pipeline::standard(
        Arc::new(PassthroughSanitizer),
        Arc::new(MemoryLogSource::new(4)),
    );
    let ctx = pipeline.run(AnalysisContext::new(
        "",
        None,
        None,
        RequestSettings::default(),
    ));

    assert_eq!(ctx.status, PipelineStatus::Degraded);
    assert!(ctx.bundle.is_none());
    // Every stage is accounted for: sanitize and the downstream consumers
    // of its output all skip.
    assert_eq!(ctx.stage_errors.len(), 5);
    assert!(ctx
        .stage_errors
        .iter()
        .all(|record| matches!(record, StageFailure::Skipped { .. })));
}
