//! Process-wide build configuration.
//!
//! A `BuildContext` is resolved once per invocation by the driver and handed
//! to every stage by shared reference. Stages never read the mode from the
//! environment themselves.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{LayoutConfig, ProjectConfig};

/// Development builds favour fast iteration; production builds optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BuildMode {
    Development,
    #[default]
    Production,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    /// Parse a mode flag the way the CLI and environment supply it.
    ///
    /// Only `development` (or `dev`) selects development mode; any other
    /// value builds for production.
    pub fn from_flag(flag: &str) -> Self {
        match flag.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => BuildMode::Development,
            _ => BuildMode::Production,
        }
    }
}

impl From<String> for BuildMode {
    fn from(flag: String) -> Self {
        Self::from_flag(&flag)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only configuration shared by every stage of one build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub mode: BuildMode,
    /// Absolute source root
    pub source_root: PathBuf,
    /// Absolute output root
    pub output_root: PathBuf,
    /// Dev server port
    pub port: u16,
    /// Source sub-locations, relative to `source_root`
    pub layout: LayoutConfig,
}

impl BuildContext {
    /// Resolve the context from a project config.
    ///
    /// Relative `source`/`output` paths are resolved against `base_path`
    /// (the directory holding the config file).
    pub fn new(config: &ProjectConfig, base_path: &Path, mode: BuildMode) -> Self {
        Self {
            mode,
            source_root: resolve_against(base_path, &config.source),
            output_root: resolve_against(base_path, &config.output),
            port: config.dev.port,
            layout: config.layout.clone(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode.is_production()
    }

    /// Absolute path of a source-relative path.
    pub fn source_path(&self, relative: &Path) -> PathBuf {
        self.source_root.join(relative)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.source_root.join(&self.layout.pages)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.source_root.join(&self.layout.templates)
    }
}

fn resolve_against(base_path: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_path.join(path)
    } else {
        path.to_path_buf()
    }
}
