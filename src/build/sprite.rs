//! SVG sprite sheet assembly and reference checking.
//!
//! The sprite is only complete once every icon has been transformed, so
//! pages reference it blindly during rendering (`img/sprite.svg#id`) and the
//! references are checked against the manifest at the end of the build.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::asset::IconSymbol;
use super::paths::to_url;

#[derive(thiserror::Error, Debug)]
pub enum SpriteError {
    #[error("duplicate sprite symbol '{id}' from {} and {}", first.display(), second.display())]
    DuplicateSymbol {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{page}: unknown sprite symbol '{id}'")]
    UnknownSymbol { page: String, id: String },

    #[error("invalid sprite reference pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Symbols merged into the sprite sheet, keyed by ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteManifest {
    /// Output-relative path of the sheet
    pub output_path: PathBuf,
    pub url: String,
    /// Symbol ID -> source-relative icon path
    pub symbols: BTreeMap<String, PathBuf>,
}

impl SpriteManifest {
    pub fn contains(&self, id: &str) -> bool {
        self.symbols.contains_key(id)
    }
}

/// The assembled sheet and its manifest.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub manifest: SpriteManifest,
    pub content: String,
}

/// Merge icon symbols into one sheet.
///
/// Symbols are written in ID order so the sheet is independent of
/// discovery order. Two icons deriving the same ID is a naming collision.
pub fn build_sprite<'a>(
    icons: impl IntoIterator<Item = (&'a Path, &'a IconSymbol)>,
    output_path: &Path,
) -> Result<Sprite, SpriteError> {
    let mut by_id: BTreeMap<&str, (&Path, &IconSymbol)> = BTreeMap::new();
    for (path, symbol) in icons {
        if let Some((first, _)) = by_id.insert(symbol.id.as_str(), (path, symbol)) {
            return Err(SpriteError::DuplicateSymbol {
                id: symbol.id.clone(),
                first: first.to_path_buf(),
                second: path.to_path_buf(),
            });
        }
    }

    let mut content = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    );
    for (id, (_, symbol)) in &by_id {
        let _ = write!(content, r#"<symbol id="{id}""#);
        if let Some(view_box) = &symbol.view_box {
            let _ = write!(content, r#" viewBox="{view_box}""#);
        }
        let _ = write!(content, ">{}</symbol>", symbol.body);
    }
    content.push_str("</svg>\n");

    let manifest = SpriteManifest {
        output_path: output_path.to_path_buf(),
        url: to_url(output_path),
        symbols: by_id
            .into_iter()
            .map(|(id, (path, _))| (id.to_string(), path.to_path_buf()))
            .collect(),
    };
    Ok(Sprite { manifest, content })
}

/// Find every `SPRITE_URL#id` in a rendered page whose ID is not in the manifest.
///
/// Leading `/` or `./` on the sprite URL are accepted.
pub fn unknown_references(
    page: &str,
    html: &str,
    sprite_url: &str,
    manifest: Option<&SpriteManifest>,
) -> Result<Vec<SpriteError>, SpriteError> {
    let pattern = Regex::new(&format!(
        r"(?:\./|/)?{}#([A-Za-z0-9_\-]+)",
        regex::escape(sprite_url)
    ))?;

    let mut errors = Vec::new();
    for captures in pattern.captures_iter(html) {
        let id = &captures[1];
        let known = manifest.is_some_and(|m| m.contains(id));
        if !known && !errors.iter().any(|e| matches!(e, SpriteError::UnknownSymbol { id: seen, .. } if seen == id)) {
            errors.push(SpriteError::UnknownSymbol {
                page: page.to_string(),
                id: id.to_string(),
            });
        }
    }
    Ok(errors)
}
