//! Bundling stage.

use crate::build::bundle::{split_chunks, unbundled_stylesheets};
use crate::build::graph::{ModuleGraph, resolve_entries};
use crate::build::pipeline::{BuildState, PipelineContext, PipelineError, Stage};

/// Stage that walks the module graph from every entry and splits chunks.
pub struct BundleStage;

impl Stage for BundleStage {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn run(&self, state: &mut BuildState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let entries = resolve_entries(&ctx.config.entries, &state.assets, ctx.build)?;
        let graph = ModuleGraph::from_assets(&state.assets);
        state.chunks = split_chunks(&graph, &entries, &state.assets);
        for path in unbundled_stylesheets(&state.chunks, &state.assets) {
            tracing::warn!(
                stylesheet = %path.display(),
                "stylesheet is not imported by any entry and will not be emitted"
            );
        }

        tracing::info!(
            entries = entries.len(),
            modules = graph.len(),
            chunks = state.chunks.len(),
            "bundled modules"
        );
        Ok(())
    }
}
