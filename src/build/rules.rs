//! Asset transform rules.
//!
//! Every file found in an asset directory is handed to the first rule that
//! matches its source-relative path. Rules are evaluated in registration
//! order, so the more specific ones (icons, standalone vectors) are
//! registered before the generic image rule.
//!
//! # Adding a Rule
//!
//! ```ignore
//! struct FontRule;
//!
//! impl TransformRule for FontRule {
//!     fn name(&self) -> &'static str { "font" }
//!     fn matches(&self, path: &Path) -> bool { has_extension(path, &["woff2"]) }
//!     fn transform(&self, file: &SourceFile, bytes: Vec<u8>, ctx: &BuildContext)
//!         -> Result<Option<TransformedAsset>, RuleError> {
//!         // ...
//!     }
//! }
//!
//! rules.register(FontRule);
//! ```

mod data;
mod icon;
mod raster;
mod script;
mod style;
mod svg;

use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;

use super::asset::{TransformedAsset, extension_of};
use super::context::BuildContext;
use super::source::SourceFile;

pub use data::DataRule;
pub use icon::IconRule;
pub use raster::ImageRule;
pub use script::ScriptRule;
pub use style::StylesheetRule;
pub use svg::{SvgRule, minify_svg};

// =============================================================================
// Errors
// =============================================================================

/// A per-file transform failure.
#[derive(thiserror::Error, Debug)]
pub enum RuleError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}: no transform rule handles this file")]
    Unsupported(PathBuf),

    #[error("{path}: file is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("{path}: invalid SVG: {message}")]
    Svg { path: PathBuf, message: String },

    #[error("{path}: {message}")]
    Stylesheet { path: PathBuf, message: String },

    #[error("{path}:{line}:{column}: {message}")]
    ScriptSyntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{path}: import '{specifier}': {message}")]
    Import {
        path: PathBuf,
        specifier: String,
        message: String,
    },

    #[error("{path}: transpile failed: {message}")]
    Transpile { path: PathBuf, message: String },
}

impl RuleError {
    /// Source-relative path of the file that failed.
    pub fn path(&self) -> &Path {
        match self {
            RuleError::Read { path, .. }
            | RuleError::Encoding { path }
            | RuleError::Svg { path, .. }
            | RuleError::Stylesheet { path, .. }
            | RuleError::ScriptSyntax { path, .. }
            | RuleError::Import { path, .. }
            | RuleError::Transpile { path, .. } => path,
            RuleError::Unsupported(path) => path,
        }
    }
}

// =============================================================================
// Rule trait and registry
// =============================================================================

/// A `{matches, transform}` strategy for one kind of source file.
pub trait TransformRule: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this rule handles the given source-relative path.
    fn matches(&self, path: &Path) -> bool;

    /// Transform the file contents.
    ///
    /// Returns `Ok(None)` for files the rule claims but that produce no
    /// asset of their own (Sass partials, which only exist to be imported).
    fn transform(
        &self,
        file: &SourceFile,
        bytes: Vec<u8>,
        ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError>;
}

/// Ordered list of transform rules; the first match wins.
pub struct RuleSet {
    rules: Vec<Box<dyn TransformRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The default rules in priority order.
    pub fn from_config(config: &ProjectConfig) -> Self {
        let layout = &config.layout;
        let mut rules = Self::new();
        rules.register(IconRule::new(layout.icons.clone(), config.sprite.symbol_prefix.clone()));
        rules.register(SvgRule::new(layout.svg.clone()));
        rules.register(StylesheetRule::new(layout.styles.clone(), &config.css));
        rules.register(ScriptRule::new(
            layout.scripts.clone(),
            layout.vendor.clone(),
            config.script.target.clone(),
        ));
        rules.register(ImageRule);
        rules.register(DataRule::new(layout.data.clone()));
        rules
    }

    /// Append a rule with the lowest priority so far.
    pub fn register<R: TransformRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    /// First rule that matches the path.
    pub fn rule_for(&self, path: &Path) -> Option<&dyn TransformRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.as_ref())
    }

    /// Read a source file and run it through its rule.
    pub fn transform(
        &self,
        file: &SourceFile,
        ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        let rule = self
            .rule_for(&file.relative)
            .ok_or_else(|| RuleError::Unsupported(file.relative.clone()))?;

        let bytes = std::fs::read(&file.absolute).map_err(|e| RuleError::Read {
            path: file.relative.clone(),
            source: e,
        })?;

        tracing::debug!(rule = rule.name(), path = %file.relative.display(), "transform");
        rule.transform(file, bytes, ctx)
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_config(&ProjectConfig::default())
    }
}

// =============================================================================
// Matching helpers
// =============================================================================

/// Whether a path has one of the given (lowercase) extensions.
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Whether a path lies under a source-relative directory.
pub(crate) fn is_under(path: &Path, dir: &Path) -> bool {
    !dir.as_os_str().is_empty() && path.starts_with(dir)
}
