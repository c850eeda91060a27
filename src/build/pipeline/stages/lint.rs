//! Lint reporting stage.

use crate::build::asset::AssetPayload;
use crate::build::lint::{LintPolicy, Severity};
use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};

/// Stage that reports the diagnostics collected while parsing scripts.
///
/// Runs before anything is emitted, so a production build failing here
/// leaves the previous output untouched.
pub struct LintStage;

impl Stage for LintStage {
    fn name(&self) -> &'static str {
        "lint"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let policy = LintPolicy::new(&ctx.config.lint, ctx.mode());

        let mut errors = Vec::new();
        let mut warnings = 0;
        let diagnostics = state.assets.values().flat_map(|asset| match &asset.payload {
            AssetPayload::Script(module) => module.diagnostics.as_slice(),
            _ => &[][..],
        });
        for diagnostic in diagnostics.filter(|d| policy.is_enabled(d.rule)) {
            match policy.severity(diagnostic.rule) {
                Severity::Warning => {
                    tracing::warn!("{diagnostic}");
                    warnings += 1;
                }
                Severity::Error => {
                    tracing::error!("{diagnostic}");
                    errors.push(diagnostic.clone());
                }
            }
        }

        if !errors.is_empty() {
            return Err(PipelineError::Lint(errors));
        }
        state.lint_warnings = warnings;
        Ok(())
    }
}
