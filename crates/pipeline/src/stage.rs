use crate::context::AnalysisContext;
use crate::error::Result;

/// One discrete, declaratively-gated unit of context transformation.
///
/// Stages are stateless apart from injected collaborators; the same stage
/// instance may serve concurrent pipelines over separate contexts.
pub trait Stage: Send + Sync {
    /// Stable identifier, e.g. `"build.context"`.
    fn id(&self) -> &'static str;

    /// Requirements checked before the stage runs. Each entry is a
    /// pipe-delimited alternative list over context fields or
    /// `metadata.<key>` paths; every entry must have at least one present,
    /// non-empty alternative or the stage is skipped.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Outputs this stage populates. Documentation only; never enforced.
    fn provides(&self) -> &'static [&'static str] {
        &[]
    }

    /// Transform the context in place.
    fn process(&self, ctx: &mut AnalysisContext) -> Result<()>;
}
