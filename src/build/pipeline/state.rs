//! In-flight build artifacts threaded through the stages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::build::asset::TransformedAsset;
use crate::build::bundle::Chunk;
use crate::build::context::BuildMode;
use crate::build::discover::PageDescriptor;
use crate::build::emit::EmitSummary;
use crate::build::sprite::Sprite;

use super::PipelineError;

/// A page after rendering and post-processing.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub descriptor: PageDescriptor,
    pub html: String,
}

/// Counts recorded when the emitter takes over the artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub pages: usize,
    pub chunks: usize,
    pub files: usize,
    pub symbols: usize,
}

/// Everything a build has produced so far.
#[derive(Debug, Default)]
pub struct BuildState {
    /// Transformed assets keyed by source-relative path
    pub assets: BTreeMap<PathBuf, TransformedAsset>,
    /// Generated files without a source of their own (webp derivatives).
    /// Duplicate paths are left for the emitter to reject.
    pub derived: Vec<(PathBuf, Vec<u8>)>,
    pub chunks: Vec<Chunk>,
    pub pages: Vec<RenderedPage>,
    pub sprite: Option<Sprite>,
    pub lint_warnings: usize,
    /// Per-file errors tolerated in development
    pub reported: Vec<String>,
    pub stats: BuildStats,
    pub emitted: Option<EmitSummary>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a failure confined to one file or page.
    ///
    /// Production builds stop on it. Development builds log it, skip the
    /// file and keep going.
    pub fn per_file_error(
        &mut self,
        mode: BuildMode,
        error: impl Into<PipelineError>,
    ) -> Result<(), PipelineError> {
        let error = error.into();
        if mode.is_production() {
            return Err(error);
        }
        tracing::error!("{error}");
        self.reported.push(error.to_string());
        Ok(())
    }
}
