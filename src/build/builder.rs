use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ProjectConfig};

use super::context::{BuildContext, BuildMode};
use super::emit::CancelToken;
use super::pipeline::{BuildState, BuildStats, Pipeline, PipelineContext, PipelineError};
use super::rules::RuleSet;
use super::source::{SourceError, SourceTree};

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("output directory {output} would replace the source root {source_root}")]
    UnsafeOutput { output: PathBuf, source_root: PathBuf },
}

impl BuildError {
    /// Whether the build was abandoned for a newer one.
    pub fn is_superseded(&self) -> bool {
        matches!(self, BuildError::Pipeline(e) if e.is_superseded())
    }
}

pub struct BuildResult {
    pub output_dir: PathBuf,
    pub mode: BuildMode,
    pub stats: BuildStats,
    pub lint_warnings: usize,
    /// Per-file errors skipped by a development build
    pub reported: Vec<String>,
}

pub struct Builder {
    config: ProjectConfig,
    /// Base path for resolving relative paths (typically the config file's directory)
    base_path: PathBuf,
    mode: BuildMode,
    live_reload: bool,
    cancel: CancelToken,
}

impl Builder {
    /// Create a builder. The mode comes from the config file unless
    /// overridden with [`Builder::with_mode`].
    pub fn new(config: ProjectConfig, base_path: PathBuf) -> Self {
        let mode = config.mode.unwrap_or_default();
        Self {
            config,
            base_path,
            mode,
            live_reload: false,
            cancel: CancelToken::never(),
        }
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Inject the live reload snippet into development pages.
    pub fn with_live_reload(mut self, enabled: bool) -> Self {
        self.live_reload = enabled;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The resolved build context (absolute source and output roots).
    pub fn context(&self) -> BuildContext {
        BuildContext::new(&self.config, &self.base_path, self.mode)
    }

    /// Run a full build.
    ///
    /// Configuration problems abort before the pipeline starts, so the
    /// output directory is only ever touched by a build that got as far as
    /// emitting.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        self.config.validate()?;
        let build = self.context();
        check_output_root(&build.source_root, &build.output_root)?;

        let source = SourceTree::resolve(&build)?;
        let rules = RuleSet::from_config(&self.config);
        tracing::info!(
            mode = %self.mode,
            source = %build.source_root.display(),
            rules = ?rules.rule_names(),
            "starting build"
        );

        let ctx = PipelineContext {
            build: &build,
            config: &self.config,
            source: &source,
            rules: &rules,
            cancel: &self.cancel,
            live_reload: self.live_reload,
        };
        let mut state = BuildState::new();
        Pipeline::for_mode(self.mode).run(&mut state, &ctx)?;

        Ok(BuildResult {
            output_dir: build.output_root,
            mode: self.mode,
            stats: state.stats,
            lint_warnings: state.lint_warnings,
            reported: state.reported,
        })
    }
}

/// The emitter replaces the whole output directory, so it must never be the
/// source root or one of its ancestors.
fn check_output_root(source_root: &Path, output_root: &Path) -> Result<(), BuildError> {
    let source = source_root
        .canonicalize()
        .unwrap_or_else(|_| source_root.to_path_buf());
    let output = output_root
        .canonicalize()
        .unwrap_or_else(|_| output_root.to_path_buf());
    if source.starts_with(&output) {
        return Err(BuildError::UnsafeOutput {
            output: output_root.to_path_buf(),
            source_root: source_root.to_path_buf(),
        });
    }
    Ok(())
}
