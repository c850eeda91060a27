//! Output stage.

use crate::build::asset::AssetPayload;
use crate::build::emit::OutputEmitter;
use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};

/// Stage that registers every artifact and swaps in the new output tree.
pub struct EmitStage;

impl Stage for EmitStage {
    fn name(&self) -> &'static str {
        "emit"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let mut emitter = OutputEmitter::new();

        let assets = std::mem::take(&mut state.assets);
        let mut files = 0;
        for asset in assets.into_values() {
            let Some(output_path) = asset.reference.output_path else {
                continue;
            };
            if let AssetPayload::File(bytes) = asset.payload {
                emitter.add(output_path, bytes)?;
                files += 1;
            }
        }
        for (path, bytes) in std::mem::take(&mut state.derived) {
            emitter.add(path, bytes)?;
            files += 1;
        }

        for chunk in std::mem::take(&mut state.chunks) {
            let Some(file_name) = chunk.file_name else {
                return Err(PipelineError::stage(
                    self.name(),
                    format!("chunk '{}' was never named", chunk.name),
                ));
            };
            emitter.add(file_name, chunk.content)?;
            state.stats.chunks += 1;
        }

        if let Some(sprite) = state.sprite.take() {
            state.stats.symbols = sprite.manifest.symbols.len();
            emitter.add(&sprite.manifest.output_path, sprite.content)?;
        }

        for page in std::mem::take(&mut state.pages) {
            emitter.add(&page.descriptor.output_path, page.html)?;
            state.stats.pages += 1;
        }
        state.stats.files = files;

        if emitter.is_empty() {
            tracing::warn!("nothing to emit");
        }
        tracing::debug!(artifacts = emitter.len(), "registered output");

        let summary = emitter.emit(&ctx.build.output_root, ctx.cancel)?;
        tracing::info!(
            files = summary.files,
            bytes = summary.bytes,
            output = %summary.output_root.display(),
            "emitted output"
        );
        state.emitted = Some(summary);
        Ok(())
    }
}
