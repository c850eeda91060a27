//! Configuration type definitions.
//!
//! This module contains all the data structures used in assetline configuration files.
//! These types are pure data - no I/O or complex logic.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::build::BuildMode;

// =============================================================================
// Project configuration
// =============================================================================

/// Project configuration - describes one source tree and its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Source root, relative to the config file
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Output root, relative to the config file
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Build mode; the CLI flag takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Script entry points (defaults to every top-level script)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryConfig>,
    #[serde(default)]
    pub html: HtmlConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub css: CssConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub lint: LintConfig,
    /// Development-specific settings (dev server, watch mode)
    #[serde(default)]
    pub dev: DevConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            mode: None,
            layout: LayoutConfig::default(),
            entries: Vec::new(),
            html: HtmlConfig::default(),
            sprite: SpriteConfig::default(),
            script: ScriptConfig::default(),
            css: CssConfig::default(),
            images: ImageConfig::default(),
            lint: LintConfig::default(),
            dev: DevConfig::default(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("src")
}

fn default_output() -> PathBuf {
    PathBuf::from("dist")
}

// =============================================================================
// Source layout
// =============================================================================

/// Fixed sub-locations of the source tree, all relative to the source root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Every template under this directory is available to `extends`/`include`
    pub templates: PathBuf,
    /// Directory scanned for page templates
    pub pages: PathBuf,
    /// Extension (without dot) of template files
    pub template_extension: String,
    pub scripts: PathBuf,
    pub styles: PathBuf,
    pub images: PathBuf,
    /// SVGs under this directory are merged into the sprite sheet
    pub icons: PathBuf,
    /// SVGs under this directory are emitted as standalone files
    pub svg: PathBuf,
    /// Third-party scripts: bundled, but never linted or transpiled
    pub vendor: PathBuf,
    /// Directories copied verbatim to the output
    pub data: Vec<PathBuf>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("templates"),
            pages: PathBuf::from("templates/pages"),
            template_extension: "html".to_string(),
            scripts: PathBuf::from("js"),
            styles: PathBuf::from("style"),
            images: PathBuf::from("img"),
            icons: PathBuf::from("img/icons"),
            svg: PathBuf::from("img/svg"),
            vendor: PathBuf::from("js/vendor"),
            data: vec![PathBuf::from("json")],
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// A named entry point and the modules it starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    pub name: String,
    /// Source-relative module paths (scripts or stylesheets)
    pub modules: Vec<PathBuf>,
}

// =============================================================================
// HTML
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Insert stylesheet and script tags for every chunk before `</head>`
    pub inject: bool,
    /// Anchors carrying this attribute have their `href` resolved as an asset
    pub lightbox_attribute: String,
    /// Strip comments in production builds
    pub remove_comments: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            inject: true,
            lightbox_attribute: "data-lightbox".to_string(),
            remove_comments: true,
        }
    }
}

// =============================================================================
// Sprite
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    /// Output-relative path of the generated sprite sheet
    pub output: PathBuf,
    /// Prepended to every derived symbol ID
    pub symbol_prefix: String,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("img/sprite.svg"),
            symbol_prefix: String::new(),
        }
    }
}

// =============================================================================
// Scripts and stylesheets
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Syntax target for transpilation (e.g. "es2015", "es2020")
    pub target: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            target: "es2015".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CssConfig {
    /// Minimum browser major versions used for vendor prefixing
    pub targets: BTreeMap<String, u32>,
}

impl Default for CssConfig {
    fn default() -> Self {
        let targets = [
            ("chrome", 80),
            ("edge", 88),
            ("firefox", 78),
            ("safari", 13),
            ("ios_saf", 13),
        ]
        .into_iter()
        .map(|(name, version)| (name.to_string(), version))
        .collect();
        Self { targets }
    }
}

// =============================================================================
// Images
// =============================================================================

/// Production image optimization options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub gif_interlaced: bool,
    pub jpeg_progressive: bool,
    /// JPEG re-encoding quality (1-100)
    pub jpeg_quality: u8,
    /// PNG optimization level (0-7)
    pub png_optimization_level: u8,
    /// Generate a webp derivative next to every png/jpeg
    pub webp: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            gif_interlaced: true,
            jpeg_progressive: true,
            jpeg_quality: 85,
            png_optimization_level: 5,
            webp: true,
        }
    }
}

// =============================================================================
// Lint
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Rules that never report
    pub disabled: Vec<String>,
    /// Rules whose violations fail production builds
    pub fatal_in_production: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            fatal_in_production: vec!["no-console".to_string(), "no-debugger".to_string()],
        }
    }
}

// =============================================================================
// Development configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Port the dev server binds to
    #[serde(default = "default_port")]
    pub port: u16,
    /// File watching configuration
    #[serde(default)]
    pub watch: WatchConfig,
    /// Enable live reload in the browser when files change (default: true)
    #[serde(default = "default_live_reload")]
    pub live_reload: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            watch: WatchConfig::default(),
            live_reload: true,
        }
    }
}

fn default_port() -> u16 {
    666
}

fn default_live_reload() -> bool {
    true
}

/// Configuration for file watching during development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Use polling-based watcher instead of native file system events.
    /// Useful for network filesystems, Docker volumes, or other situations
    /// where native events are unreliable.
    #[serde(default)]
    pub poll: bool,
    /// Poll interval in milliseconds (only used if poll=true).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Debounce timeout in milliseconds.
    /// Changes within this window are batched together.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}
