//! Pipeline error types.

use crate::build::bundle::BundleError;
use crate::build::discover::DiscoverError;
use crate::build::emit::EmitError;
use crate::build::html::HtmlError;
use crate::build::lint::LintDiagnostic;
use crate::build::optimize::OptimizeError;
use crate::build::render::RenderError;
use crate::build::rules::RuleError;
use crate::build::source::SourceError;
use crate::build::sprite::SpriteError;

/// Errors that can occur during pipeline processing.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("page discovery error: {0}")]
    Discover(#[from] DiscoverError),

    #[error("transform error: {0}")]
    Rule(#[from] RuleError),

    #[error("lint failed with {} error(s):\n{}", .0.len(), list(.0))]
    Lint(Vec<LintDiagnostic>),

    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("optimize error: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("html error: {0}")]
    Html(#[from] HtmlError),

    #[error("sprite error: {0}")]
    Sprite(#[from] SpriteError),

    #[error("emit error: {0}")]
    Emit(#[from] EmitError),

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    /// Create a stage-specific error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, PipelineError::Emit(EmitError::Superseded))
    }
}

fn list(diagnostics: &[LintDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}
