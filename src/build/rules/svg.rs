//! Standalone vector files, emitted individually.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::build::asset::{AssetPayload, AssetReference, MimeClass, TransformedAsset};
use crate::build::context::BuildContext;
use crate::build::source::SourceFile;

use super::{RuleError, TransformRule, has_extension, is_under};

static XML_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").expect("valid regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<metadata\b.*?</metadata>").expect("valid regex"));
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));

pub struct SvgRule {
    svg_dir: PathBuf,
}

impl SvgRule {
    pub fn new(svg_dir: PathBuf) -> Self {
        Self { svg_dir }
    }
}

impl TransformRule for SvgRule {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn matches(&self, path: &Path) -> bool {
        is_under(path, &self.svg_dir) && has_extension(path, &["svg"])
    }

    fn transform(
        &self,
        file: &SourceFile,
        bytes: Vec<u8>,
        ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        let bytes = if ctx.is_production() {
            let text = String::from_utf8(bytes).map_err(|_| RuleError::Encoding {
                path: file.relative.clone(),
            })?;
            minify_svg(&text).into_bytes()
        } else {
            bytes
        };

        let reference = AssetReference::new(
            file.relative.clone(),
            Some(file.relative.clone()),
            &bytes,
            MimeClass::Vector,
        );
        Ok(Some(TransformedAsset {
            reference,
            payload: AssetPayload::File(bytes),
        }))
    }
}

/// Strip the XML declaration, comments, `<metadata>` and whitespace between tags.
pub fn minify_svg(text: &str) -> String {
    let text = XML_DECLARATION.replace_all(text, "");
    let text = COMMENT.replace_all(&text, "");
    let text = METADATA.replace_all(&text, "");
    BETWEEN_TAGS.replace_all(text.trim(), "><").into_owned()
}
