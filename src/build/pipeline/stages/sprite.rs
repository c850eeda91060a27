//! Sprite sheet stages.

use crate::build::asset::AssetPayload;
use crate::build::paths::to_url;
use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};
use crate::build::sprite::{build_sprite, unknown_references};

/// Stage that merges every icon into one sprite sheet.
///
/// Two icons deriving the same symbol ID fail the build in either mode.
pub struct SpriteStage;

impl Stage for SpriteStage {
    fn name(&self) -> &'static str {
        "sprite"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let icons: Vec<_> = state
            .assets
            .iter()
            .filter_map(|(path, asset)| match &asset.payload {
                AssetPayload::Icon(symbol) => Some((path.as_path(), symbol)),
                _ => None,
            })
            .collect();
        if icons.is_empty() {
            return Ok(());
        }

        let sprite = build_sprite(icons, &ctx.config.sprite.output)?;
        tracing::info!(
            symbols = sprite.manifest.symbols.len(),
            output = %sprite.manifest.url,
            "built sprite"
        );
        state.sprite = Some(sprite);
        Ok(())
    }
}

/// Stage that checks every `sprite.svg#id` reference in the rendered pages.
pub struct SpriteRefsStage;

impl Stage for SpriteRefsStage {
    fn name(&self) -> &'static str {
        "sprite-refs"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let sprite_url = to_url(&ctx.config.sprite.output);
        let manifest = state.sprite.as_ref().map(|s| &s.manifest);

        let mut unknown = Vec::new();
        for page in &state.pages {
            unknown.extend(unknown_references(
                &page.descriptor.template_name,
                &page.html,
                &sprite_url,
                manifest,
            )?);
        }

        if ctx.mode().is_production() {
            for error in &unknown {
                tracing::error!("{error}");
            }
            return match unknown.into_iter().next() {
                Some(first) => Err(first.into()),
                None => Ok(()),
            };
        }
        for error in unknown {
            state.per_file_error(ctx.mode(), error)?;
        }
        Ok(())
    }
}
