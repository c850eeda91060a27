//! Stylesheets: Sass compilation, vendor prefixing in production.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::build::asset::{AssetPayload, AssetReference, MimeClass, TransformedAsset};
use crate::build::context::BuildContext;
use crate::build::source::SourceFile;
use crate::config::CssConfig;

use super::{RuleError, TransformRule, has_extension, is_under};

pub struct StylesheetRule {
    styles_dir: PathBuf,
    browsers: Browsers,
}

impl StylesheetRule {
    pub fn new(styles_dir: PathBuf, config: &CssConfig) -> Self {
        Self {
            styles_dir,
            browsers: browsers_from_config(config),
        }
    }
}

impl TransformRule for StylesheetRule {
    fn name(&self) -> &'static str {
        "stylesheet"
    }

    fn matches(&self, path: &Path) -> bool {
        is_under(path, &self.styles_dir) && has_extension(path, &["scss", "sass", "css"])
    }

    fn transform(
        &self,
        file: &SourceFile,
        _bytes: Vec<u8>,
        ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        if is_partial(&file.relative) {
            return Ok(None);
        }

        // grass reads the file itself so relative @use/@import paths resolve
        let styles_root = ctx.source_root.join(&self.styles_dir);
        let options = grass::Options::default()
            .load_path(&ctx.source_root)
            .load_path(&styles_root);
        let css = grass::from_path(&file.absolute, &options).map_err(|e| {
            RuleError::Stylesheet {
                path: file.relative.clone(),
                message: e.to_string(),
            }
        })?;

        let css = if ctx.is_production() {
            add_vendor_prefixes(&css, &file.relative, self.browsers)?
        } else {
            css
        };

        let reference = AssetReference::new(
            file.relative.clone(),
            None,
            css.as_bytes(),
            MimeClass::Stylesheet,
        );
        Ok(Some(TransformedAsset {
            reference,
            payload: AssetPayload::Stylesheet(css),
        }))
    }
}

/// Sass partials (`_name.scss`) are only compiled through the files importing them.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn add_vendor_prefixes(css: &str, path: &Path, browsers: Browsers) -> Result<String, RuleError> {
    let to_error = |message: String| RuleError::Stylesheet {
        path: path.to_path_buf(),
        message,
    };

    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: path.to_string_lossy().into_owned(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| to_error(e.to_string()))?;

    stylesheet
        .minify(MinifyOptions {
            targets: Targets::from(browsers),
            ..MinifyOptions::default()
        })
        .map_err(|e| to_error(e.to_string()))?;

    let result = stylesheet
        .to_css(PrinterOptions {
            targets: Targets::from(browsers),
            ..PrinterOptions::default()
        })
        .map_err(|e| to_error(e.to_string()))?;
    Ok(result.code)
}

/// Convert `browser -> major version` pairs into lightningcss targets.
///
/// Unknown browser names are ignored.
pub fn browsers_from_config(config: &CssConfig) -> Browsers {
    let mut browsers = Browsers::default();
    for (name, major) in &config.targets {
        let version = Some(*major << 16);
        match name.as_str() {
            "android" => browsers.android = version,
            "chrome" => browsers.chrome = version,
            "edge" => browsers.edge = version,
            "firefox" => browsers.firefox = version,
            "ie" => browsers.ie = version,
            "ios_saf" | "ios" => browsers.ios_saf = version,
            "opera" => browsers.opera = version,
            "safari" => browsers.safari = version,
            "samsung" => browsers.samsung = version,
            other => tracing::debug!(browser = other, "ignoring unknown css target"),
        }
    }
    browsers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildMode;
    use crate::config::ProjectConfig;
    use std::fs;

    fn setup(mode: BuildMode) -> (tempfile::TempDir, BuildContext) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/style")).unwrap();
        let ctx = BuildContext::new(&ProjectConfig::default(), dir.path(), mode);
        (dir, ctx)
    }

    fn compile(ctx: &BuildContext, name: &str) -> Result<Option<TransformedAsset>, RuleError> {
        let rule = StylesheetRule::new(PathBuf::from("style"), &CssConfig::default());
        let relative = PathBuf::from("style").join(name);
        let file = SourceFile {
            absolute: ctx.source_root.join(&relative),
            relative,
        };
        rule.transform(&file, Vec::new(), ctx)
    }

    fn css_of(asset: TransformedAsset) -> String {
        match asset.payload {
            AssetPayload::Stylesheet(css) => css,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_compiles_scss_with_partial() {
        let (_dir, ctx) = setup(BuildMode::Development);
        fs::write(ctx.source_root.join("style/_vars.scss"), "$accent: #f00;").unwrap();
        fs::write(
            ctx.source_root.join("style/main.scss"),
            "@use 'vars';\n.a { .b { color: vars.$accent; } }",
        )
        .unwrap();

        let css = css_of(compile(&ctx, "main.scss").unwrap().unwrap());
        assert!(css.contains(".a .b"));
        assert!(css.contains("red") || css.contains("#f00"));
    }

    #[test]
    fn test_partial_produces_nothing() {
        let (_dir, ctx) = setup(BuildMode::Development);
        fs::write(ctx.source_root.join("style/_vars.scss"), "$a: 1px;").unwrap();
        assert!(compile(&ctx, "_vars.scss").unwrap().is_none());
    }

    #[test]
    fn test_syntax_error_names_file() {
        let (_dir, ctx) = setup(BuildMode::Development);
        fs::write(ctx.source_root.join("style/broken.scss"), ".a { color: red;").unwrap();

        let err = compile(&ctx, "broken.scss").unwrap_err();
        assert!(matches!(err, RuleError::Stylesheet { .. }));
        assert!(err.to_string().starts_with("style/broken.scss"));
    }

    #[test]
    fn test_production_adds_prefixes() {
        let (_dir, ctx) = setup(BuildMode::Production);
        fs::write(
            ctx.source_root.join("style/main.css"),
            ".a { user-select: none; }",
        )
        .unwrap();

        let css = css_of(compile(&ctx, "main.css").unwrap().unwrap());
        assert!(css.contains("-webkit-user-select"));
    }

    #[test]
    fn test_browsers_from_config() {
        let browsers = browsers_from_config(&CssConfig::default());
        assert_eq!(browsers.chrome, Some(80 << 16));
        assert_eq!(browsers.ios_saf, Some(13 << 16));
        assert_eq!(browsers.ie, None);
    }
}
