//! Page rendering stage.

use std::sync::Arc;

use crate::build::bundle::{ChunkKind, chunk_urls};
use crate::build::discover::{RenderOptions, discover_pages};
use crate::build::html::{AssetIndex, InjectedAssets, PostProcessOptions, post_process};
use crate::build::paths::to_url;
use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, RenderedPage, Stage};
use crate::build::render::{AssetsContext, PageContext, PageInfo, Renderer};

/// Stage that renders every page template and rewrites its asset references.
///
/// A page that fails to render or references an unknown asset is dropped in
/// development and fails the build in production.
pub struct PagesStage;

impl Stage for PagesStage {
    fn name(&self) -> &'static str {
        "pages"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let layout = &ctx.build.layout;
        let source_root = ctx.source.root();
        let templates_dir = ctx.build.templates_dir();

        let pages = discover_pages(
            &ctx.build.pages_dir(),
            &templates_dir,
            source_root,
            &layout.template_extension,
            &RenderOptions::from(&ctx.config.html),
        )?;

        let mut renderer = match Renderer::new(&templates_dir, source_root, &layout.template_extension, &pages) {
            Ok(renderer) => renderer,
            Err(e) => return state.per_file_error(ctx.mode(), e),
        };

        let sprite_url = to_url(&ctx.config.sprite.output);
        let index = Arc::new(AssetIndex::new(&state.assets, vec![sprite_url.clone()]));
        renderer.register_functions(Arc::clone(&index), sprite_url);

        let injected = InjectedAssets {
            styles: chunk_urls(&state.chunks, ChunkKind::Stylesheet),
            scripts: chunk_urls(&state.chunks, ChunkKind::Script),
        };

        for page in pages {
            let name = page
                .template_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let context = PageContext {
                page: PageInfo {
                    name,
                    output: to_url(&page.output_path),
                },
                mode: ctx.mode().as_str().to_string(),
                assets: AssetsContext {
                    styles: injected.styles.clone(),
                    scripts: injected.scripts.clone(),
                },
            };
            let options = PostProcessOptions {
                production: ctx.mode().is_production(),
                lightbox_attribute: ctx.config.html.lightbox_attribute.clone(),
                webp: ctx.config.images.webp,
                inject: page.render_options.inject,
                remove_comments: page.render_options.remove_comments,
                live_reload: ctx.live_reload,
            };

            let rendered = match renderer.render_page(&page, &context) {
                Ok(html) => html,
                Err(e) => {
                    state.per_file_error(ctx.mode(), e)?;
                    continue;
                }
            };
            let page_dir = page.source_dir(source_root);
            match post_process(&rendered, &page.template_name, &page_dir, &index, &injected, &options) {
                Ok(html) => state.pages.push(RenderedPage { descriptor: page, html }),
                Err(e) => state.per_file_error(ctx.mode(), e)?,
            }
        }

        tracing::info!(pages = state.pages.len(), "rendered pages");
        Ok(())
    }
}
