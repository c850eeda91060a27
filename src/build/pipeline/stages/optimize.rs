//! Production optimization stage.

use crate::build::asset::{AssetPayload, AssetReference, MimeClass};
use crate::build::bundle::ChunkKind;
use crate::build::optimize::{is_optimizable, minify_css, minify_js, optimize_images};
use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};

/// Stage that minifies chunks and re-encodes images.
///
/// Only part of production pipelines; every failure here is fatal.
pub struct OptimizeStage;

impl Stage for OptimizeStage {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        for chunk in &mut state.chunks {
            chunk.content = match chunk.kind {
                ChunkKind::Stylesheet => minify_css(&chunk.name, &chunk.content)?,
                ChunkKind::Script => minify_js(&chunk.name, &chunk.content)?,
            };
        }

        let images: Vec<_> = state
            .assets
            .iter()
            .filter(|(path, asset)| {
                matches!(asset.reference.mime_class, MimeClass::Image | MimeClass::Vector)
                    && asset.reference.output_path.is_some()
                    && is_optimizable(path)
            })
            .filter_map(|(path, asset)| match &asset.payload {
                AssetPayload::File(bytes) => Some((path.clone(), bytes.clone())),
                _ => None,
            })
            .collect();
        let count = images.len();

        for result in optimize_images(images, &ctx.config.images) {
            let image = result?;
            if let Some((webp_path, webp)) = image.webp {
                state.derived.push((webp_path, webp));
            }
            if let Some(asset) = state.assets.get_mut(&image.path) {
                asset.reference = AssetReference::new(
                    asset.reference.source_path.clone(),
                    asset.reference.output_path.clone(),
                    &image.bytes,
                    asset.reference.mime_class,
                );
                asset.payload = AssetPayload::File(image.bytes);
            }
        }

        tracing::info!(chunks = state.chunks.len(), images = count, "optimized");
        Ok(())
    }
}
