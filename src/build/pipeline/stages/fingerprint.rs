//! Chunk naming stage.

use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};

/// Stage that assigns every chunk its output file name.
///
/// Runs after optimization so production hashes cover the final bytes.
pub struct FingerprintStage;

impl Stage for FingerprintStage {
    fn name(&self) -> &'static str {
        "fingerprint"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        for chunk in &mut state.chunks {
            chunk.assign_file_name(ctx.mode());
        }
        Ok(())
    }
}
