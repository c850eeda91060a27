//! Icons merged into the sprite sheet.

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::build::asset::{AssetPayload, AssetReference, IconSymbol, MimeClass, TransformedAsset};
use crate::build::context::BuildContext;
use crate::build::source::SourceFile;

use super::{RuleError, TransformRule, has_extension, is_under};

pub struct IconRule {
    icons_dir: PathBuf,
    symbol_prefix: String,
}

impl IconRule {
    pub fn new(icons_dir: PathBuf, symbol_prefix: String) -> Self {
        Self {
            icons_dir,
            symbol_prefix,
        }
    }
}

impl TransformRule for IconRule {
    fn name(&self) -> &'static str {
        "icon"
    }

    fn matches(&self, path: &Path) -> bool {
        is_under(path, &self.icons_dir) && has_extension(path, &["svg"])
    }

    fn transform(
        &self,
        file: &SourceFile,
        bytes: Vec<u8>,
        _ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        let text = String::from_utf8(bytes).map_err(|_| RuleError::Encoding {
            path: file.relative.clone(),
        })?;

        let (view_box, body) = parse_svg(&text).map_err(|message| RuleError::Svg {
            path: file.relative.clone(),
            message,
        })?;

        let symbol = IconSymbol {
            id: symbol_id(&self.symbol_prefix, &file.relative),
            view_box,
            body,
        };

        let reference = AssetReference::new(
            file.relative.clone(),
            None,
            text.as_bytes(),
            MimeClass::Icon,
        );

        Ok(Some(TransformedAsset {
            reference,
            payload: AssetPayload::Icon(symbol),
        }))
    }
}

/// Derive a sprite symbol ID from an icon's file stem.
///
/// The stem is lowercased and every character outside `[a-z0-9]` becomes `-`.
fn symbol_id(prefix: &str, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let slug: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{prefix}{slug}")
}

/// Extract the `viewBox` and the inner markup of the root `<svg>` element.
fn parse_svg(text: &str) -> Result<(Option<String>, String), String> {
    let mut reader = Reader::from_str(text);
    let mut view_box = None;
    let mut body_start: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => match body_start {
                Some(_) => depth += 1,
                None if is_svg(&e) => {
                    view_box = view_box_of(&e)?;
                    body_start = Some(reader.buffer_position() as usize);
                }
                None => return Err("root element is not <svg>".to_string()),
            },
            Ok(Event::Empty(e)) if body_start.is_none() => {
                if is_svg(&e) {
                    return Ok((view_box_of(&e)?, String::new()));
                }
                return Err("root element is not <svg>".to_string());
            }
            Ok(Event::End(_)) => {
                let Some(start) = body_start else {
                    return Err("unexpected closing tag".to_string());
                };
                if depth == 0 {
                    return Ok((view_box, text[start..before].trim().to_string()));
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return Err("missing </svg>".to_string()),
            Ok(_) => {}
            Err(e) => return Err(format!("at byte {}: {e}", reader.error_position())),
        }
    }
}

fn is_svg(element: &BytesStart<'_>) -> bool {
    element.local_name().as_ref() == b"svg"
}

fn view_box_of(element: &BytesStart<'_>) -> Result<Option<String>, String> {
    let attribute = element
        .try_get_attribute("viewBox")
        .map_err(|e| e.to_string())?;
    Ok(attribute.map(|a| String::from_utf8_lossy(&a.value).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildMode;
    use crate::config::ProjectConfig;

    #[test]
    fn test_symbol_id() {
        assert_eq!(symbol_id("", Path::new("img/icons/Home.svg")), "home");
        assert_eq!(symbol_id("", Path::new("img/icons/arrow_left.svg")), "arrow-left");
        assert_eq!(symbol_id("i-", Path::new("img/icons/a b.svg")), "i-a-b");
    }

    #[test]
    fn test_parse_svg() {
        let (view_box, body) = parse_svg(
            r#"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
  <g><path d="M0 0h24v24H0z"/></g>
</svg>"#,
        )
        .unwrap();
        assert_eq!(view_box.as_deref(), Some("0 0 24 24"));
        assert_eq!(body, r#"<g><path d="M0 0h24v24H0z"/></g>"#);
    }

    #[test]
    fn test_parse_svg_self_closing() {
        let (view_box, body) = parse_svg(r#"<svg viewBox="0 0 1 1"/>"#).unwrap();
        assert_eq!(view_box.as_deref(), Some("0 0 1 1"));
        assert!(body.is_empty());
    }

    #[test]
    fn test_parse_svg_rejects_broken_markup() {
        assert!(parse_svg("<svg><g></svg>").is_err());
        assert!(parse_svg("<div></div>").is_err());
        assert!(parse_svg("<svg>").is_err());
    }

    #[test]
    fn test_transform_icon() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(&ProjectConfig::default(), dir.path(), BuildMode::Production);
        let rule = IconRule::new(PathBuf::from("img/icons"), String::new());
        let file = SourceFile {
            relative: PathBuf::from("img/icons/Mail-Open.svg"),
            absolute: dir.path().join("src/img/icons/Mail-Open.svg"),
        };

        let asset = rule
            .transform(&file, br#"<svg viewBox="0 0 8 8"><path d="M0"/></svg>"#.to_vec(), &ctx)
            .unwrap()
            .unwrap();

        assert_eq!(asset.reference.mime_class, MimeClass::Icon);
        assert!(asset.reference.output_path.is_none());
        match asset.payload {
            AssetPayload::Icon(symbol) => {
                assert_eq!(symbol.id, "mail-open");
                assert_eq!(symbol.body, r#"<path d="M0"/>"#);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
