//! Asset references and transformed asset payloads.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::hash::ContentHash;
use super::lint::LintDiagnostic;
use super::paths::to_url;

// =============================================================================
// Asset references
// =============================================================================

/// Broad class of an asset, used to route it through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeClass {
    Stylesheet,
    Script,
    Image,
    Vector,
    Icon,
    Data,
}

/// Where a processed source file ends up.
///
/// `content_hash` is derived from the bytes that will be emitted, so two
/// builds of identical content always agree on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Path relative to the source root
    pub source_path: PathBuf,
    /// Path relative to the output root; `None` for assets that are only
    /// emitted as part of a bundle or the sprite sheet
    pub output_path: Option<PathBuf>,
    pub content_hash: ContentHash,
    pub mime_class: MimeClass,
}

impl AssetReference {
    pub fn new(
        source_path: PathBuf,
        output_path: Option<PathBuf>,
        bytes: &[u8],
        mime_class: MimeClass,
    ) -> Self {
        Self {
            source_path,
            output_path,
            content_hash: ContentHash::of(bytes),
            mime_class,
        }
    }

    /// URL of the emitted file, relative to the output root.
    pub fn url(&self) -> Option<String> {
        self.output_path.as_deref().map(to_url)
    }
}

// =============================================================================
// Transformed assets
// =============================================================================

/// A compiled script module and what it pulls in.
#[derive(Debug, Clone)]
pub struct ScriptModule {
    /// Bundle-ready code: a registry definition for first-party modules,
    /// the plain script for vendored ones
    pub code: String,
    /// Source-relative paths of imported scripts, in import order
    pub script_deps: Vec<PathBuf>,
    /// Source-relative paths of imported stylesheets, in import order
    pub style_deps: Vec<PathBuf>,
    /// Whether the module is third-party code
    pub vendored: bool,
    pub diagnostics: Vec<LintDiagnostic>,
}

/// One `<symbol>` of the sprite sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSymbol {
    pub id: String,
    pub view_box: Option<String>,
    /// Markup between `<svg>` and `</svg>`
    pub body: String,
}

/// The payload a transform rule produces.
#[derive(Debug, Clone)]
pub enum AssetPayload {
    /// Compiled CSS, bundled later
    Stylesheet(String),
    /// Script module, bundled later
    Script(ScriptModule),
    /// File emitted on its own (images, standalone vectors, data)
    File(Vec<u8>),
    /// Icon merged into the sprite sheet
    Icon(IconSymbol),
}

/// Output of a transform rule.
#[derive(Debug, Clone)]
pub struct TransformedAsset {
    pub reference: AssetReference,
    pub payload: AssetPayload,
}

// =============================================================================
// Helpers
// =============================================================================

/// Raster formats the image rule handles.
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "ico"];

/// Raster formats that get a webp derivative and a `<picture>` wrapper.
pub const WEBP_SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Lowercased extension of a path.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether a path (or URL path) points at a raster image that gets a webp variant.
pub fn has_webp_variant(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| WEBP_SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

/// Output path of the webp derivative of an image.
pub fn webp_path(path: &Path) -> PathBuf {
    path.with_extension("webp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_hash_follows_content() {
        let a = AssetReference::new("img/a.png".into(), Some("img/a.png".into()), b"one", MimeClass::Image);
        let b = AssetReference::new("img/b.png".into(), Some("img/b.png".into()), b"one", MimeClass::Image);
        let c = AssetReference::new("img/a.png".into(), Some("img/a.png".into()), b"two", MimeClass::Image);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_eq!(a.url().as_deref(), Some("img/a.png"));
    }

    #[test]
    fn test_webp_variant() {
        assert!(has_webp_variant(Path::new("img/cat.JPG")));
        assert!(has_webp_variant(Path::new("img/cat.png")));
        assert!(!has_webp_variant(Path::new("img/anim.gif")));
        assert!(!has_webp_variant(Path::new("img/logo.svg")));
        assert_eq!(webp_path(Path::new("img/cat.jpg")), PathBuf::from("img/cat.webp"));
    }
}
