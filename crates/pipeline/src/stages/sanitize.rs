use crate::context::AnalysisContext;
use crate::error::Result;
use crate::stage::Stage;
use serde_json::json;
use std::sync::Arc;
use triage_protocol::Sanitizer;

/// Runs the PII collaborator over the raw trace, once, up front.
///
/// Everything downstream reads `sanitized_trace`; after this stage no raw
/// field leaves the process.
pub struct SanitizeStage {
    sanitizer: Arc<dyn Sanitizer>,
}

impl SanitizeStage {
    pub fn new(sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

impl Stage for SanitizeStage {
    fn id(&self) -> &'static str {
        "sanitize.trace"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["raw_trace"]
    }

    fn provides(&self) -> &'static [&'static str] {
        &["sanitized_trace", "metadata.pii_found"]
    }

    fn process(&self, ctx: &mut AnalysisContext) -> Result<()> {
        let outcome = self
            .sanitizer
            .sanitize(&ctx.raw_trace, ctx.settings.privacy_level);

        ctx.metadata
            .insert("pii_found".to_string(), json!(outcome.pii_found));
        if !outcome.replacement_counts.is_empty() {
            ctx.metadata.insert(
                "pii_replacements".to_string(),
                json!(outcome.replacement_counts),
            );
        }
        ctx.sanitized_trace = Some(outcome.sanitized_text);
        Ok(())
    }
}
