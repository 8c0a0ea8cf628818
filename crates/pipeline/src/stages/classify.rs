use crate::context::AnalysisContext;
use crate::error::Result;
use crate::matchers::{registry, MatcherRegistry};
use crate::stage::Stage;
use serde_json::{json, Value};
use std::sync::Arc;

/// Classifies the failure against the matcher registry.
///
/// Reads the process-wide registry snapshot unless one was injected (tests
/// inject to stay independent of global state).
#[derive(Default)]
pub struct ClassifyStage {
    registry: Option<Arc<MatcherRegistry>>,
}

impl ClassifyStage {
    pub fn with_registry(registry: Arc<MatcherRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }
}

impl Stage for ClassifyStage {
    fn id(&self) -> &'static str {
        "classify.pattern"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["sanitized_trace|raw_trace"]
    }

    fn provides(&self) -> &'static [&'static str] {
        &["suggestion", "metadata.pattern_matched"]
    }

    fn process(&self, ctx: &mut AnalysisContext) -> Result<()> {
        let text = ctx.sanitized_trace.as_deref().unwrap_or(&ctx.raw_trace);
        let snapshot = match &self.registry {
            Some(injected) => injected.clone(),
            None => registry(),
        };

        match snapshot.first_match(text) {
            Some(suggestion) => {
                ctx.metadata.insert(
                    "pattern_matched".to_string(),
                    json!(suggestion.pattern_id),
                );
                ctx.suggestion = Some(suggestion);
            }
            None => {
                ctx.metadata
                    .insert("pattern_matched".to_string(), Value::Null);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestSettings;
    use pretty_assertions::assert_eq;

    fn run(trace: &str) -> AnalysisContext {
        let mut ctx = AnalysisContext::new(trace, None, None, RequestSettings::default());
        let stage = ClassifyStage::with_registry(Arc::new(MatcherRegistry::builtin()));
        stage.process(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn known_pattern_yields_suggestion_and_metadata() {
        let ctx = run("torch.cuda.OutOfMemoryError: CUDA out of memory.");
        assert_eq!(
            ctx.suggestion.as_ref().unwrap().pattern_id,
            "out_of_memory"
        );
        assert_eq!(ctx.metadata["pattern_matched"], json!("out_of_memory"));
    }

    #[test]
    fn unmatched_trace_records_null_without_suggestion() {
        let ctx = run("ZeroDivisionError: division by zero");
        assert!(ctx.suggestion.is_none());
        assert_eq!(ctx.metadata["pattern_matched"], Value::Null);
    }

    #[test]
    fn sanitized_text_is_preferred_over_raw() {
        let mut ctx = AnalysisContext::new(
            "RuntimeError: CUDA out of memory",
            None,
            None,
            RequestSettings::default(),
        );
        ctx.sanitized_trace = Some("nothing to see".to_string());
        let stage = ClassifyStage::with_registry(Arc::new(MatcherRegistry::builtin()));
        stage.process(&mut ctx).unwrap();
        assert!(ctx.suggestion.is_none(), "raw trace must not be consulted");
    }
}
