//! Asset transform stage.

use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};

/// Stage that runs every file of the asset directories through its rule.
///
/// Files that fail to transform are skipped in development and abort the
/// build in production.
pub struct AssetsStage;

impl Stage for AssetsStage {
    fn name(&self) -> &'static str {
        "assets"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let files = ctx.source.discover_assets()?;
        tracing::info!(files = files.len(), "transforming assets");

        for file in files {
            match ctx.rules.transform(&file, ctx.build) {
                Ok(Some(asset)) => {
                    state.assets.insert(file.relative, asset);
                }
                Ok(None) => {}
                Err(e) => state.per_file_error(ctx.mode(), e)?,
            }
        }

        Ok(())
    }
}
