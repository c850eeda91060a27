//! Pipeline context for sharing read-only resources across stages.

use crate::build::context::{BuildContext, BuildMode};
use crate::build::emit::CancelToken;
use crate::build::rules::RuleSet;
use crate::build::source::SourceTree;
use crate::config::ProjectConfig;

/// Shared context for pipeline stages.
///
/// Everything here is fixed for the duration of one build; stages only
/// ever mutate the [`BuildState`](super::BuildState).
pub struct PipelineContext<'a> {
    /// Mode and resolved paths
    pub build: &'a BuildContext,

    /// Full project configuration
    pub config: &'a ProjectConfig,

    /// Validated source tree
    pub source: &'a SourceTree,

    /// Transform rules in priority order
    pub rules: &'a RuleSet,

    /// Fires when a newer change supersedes this build
    pub cancel: &'a CancelToken,

    /// Inject the live reload snippet (development only)
    pub live_reload: bool,
}

impl PipelineContext<'_> {
    pub fn mode(&self) -> BuildMode {
        self.build.mode
    }
}
