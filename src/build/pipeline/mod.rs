//! Build pipeline.
//!
//! A build is an explicit, ordered list of named stages sharing one
//! [`BuildState`]:
//!
//! 1. `assets` - transform every source file through the rule set
//! 2. `lint` - report script diagnostics, failing production builds
//! 3. `bundle` - walk the module graph and split chunks
//! 4. `optimize` - minify chunks and re-encode images (production only)
//! 5. `fingerprint` - name chunks, with content hashes in production
//! 6. `pages` - render and post-process every page
//! 7. `sprite` - merge icons into the sprite sheet
//! 8. `sprite-refs` - check page references against the sprite
//! 9. `emit` - write everything and swap the output directory
//!
//! Nothing touches the output directory before `emit`, so a failing stage
//! leaves the previous build in place.

mod context;
mod error;
mod stages;
mod state;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use state::{BuildState, BuildStats, RenderedPage};

use stages::{
    AssetsStage, BundleStage, EmitStage, FingerprintStage, LintStage, OptimizeStage, PagesStage,
    SpriteRefsStage, SpriteStage,
};

use super::context::BuildMode;
use super::emit::EmitError;

/// A stage of the build pipeline.
pub trait Stage: Send + Sync {
    /// Unique name for this stage (used in logs and errors).
    fn name(&self) -> &'static str;

    /// Advance the build state.
    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError>;
}

/// The ordered stage list of one build.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline with no stages.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// The stage list for a build mode.
    ///
    /// Optimization only runs in production.
    pub fn for_mode(mode: BuildMode) -> Self {
        let mut pipeline = Self::new();
        pipeline
            .add_stage(AssetsStage)
            .add_stage(LintStage)
            .add_stage(BundleStage);
        if mode.is_production() {
            pipeline.add_stage(OptimizeStage);
        }
        pipeline
            .add_stage(FingerprintStage)
            .add_stage(PagesStage)
            .add_stage(SpriteStage)
            .add_stage(SpriteRefsStage)
            .add_stage(EmitStage);
        pipeline
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Run every stage in order.
    ///
    /// Stops at the first failing stage, or before the next stage once the
    /// build has been superseded.
    pub fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        for stage in &self.stages {
            if ctx.cancel.is_cancelled() {
                return Err(EmitError::Superseded.into());
            }
            tracing::debug!(stage = stage.name(), "running stage");
            stage.run(state, ctx)?;
        }
        Ok(())
    }

    /// Get the names of all stages in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::for_mode(BuildMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_stage_order() {
        let pipeline = Pipeline::for_mode(BuildMode::Production);
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "assets",
                "lint",
                "bundle",
                "optimize",
                "fingerprint",
                "pages",
                "sprite",
                "sprite-refs",
                "emit"
            ]
        );
    }

    #[test]
    fn test_development_skips_optimize() {
        let pipeline = Pipeline::for_mode(BuildMode::Development);
        let names = pipeline.stage_names();
        assert!(!names.contains(&"optimize"));
        assert_eq!(names.first(), Some(&"assets"));
        assert_eq!(names.last(), Some(&"emit"));
    }
}
