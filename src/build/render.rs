use std::collections::{HashMap, HashSet};
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tera::{Context, Tera, Value};

use super::discover::{PageDescriptor, template_name};
use super::html::{AssetIndex, Resolution};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{template}: {message}")]
    Template { template: String, message: String },
}

impl RenderError {
    fn template(template: &str, error: &tera::Error) -> Self {
        Self::Template {
            template: template.to_string(),
            message: describe(error),
        }
    }
}

/// Flatten a Tera error and its causes into one line.
///
/// The outer error only says which template failed; the location and the
/// actual problem live in the source chain.
fn describe(error: &tera::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Context passed to page templates.
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub page: PageInfo,
    /// `development` or `production`
    pub mode: String,
    pub assets: AssetsContext,
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    /// Template file stem, e.g. `index`
    pub name: String,
    /// Output file, e.g. `index.html`
    pub output: String,
}

/// Bundle URLs in load order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetsContext {
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
}

/// The template renderer, wrapping Tera.
///
/// Layouts and partials are parsed once into a shared base; every page is
/// then parsed on top of a copy of that base, so a broken page cannot take
/// the others down with it.
pub struct Renderer {
    base: Tera,
}

impl Renderer {
    /// Load every template under `templates_dir` except the pages themselves.
    pub fn new(
        templates_dir: &Path,
        source_root: &Path,
        extension: &str,
        pages: &[PageDescriptor],
    ) -> Result<Self, RenderError> {
        let page_paths: HashSet<&Path> = pages.iter().map(|p| p.template_path.as_path()).collect();

        let mut files = Vec::new();
        collect_templates(templates_dir, extension, &mut files)?;
        files.sort();

        let mut sources = Vec::new();
        for path in files.iter().filter(|p| !page_paths.contains(p.as_path())) {
            let content = std::fs::read_to_string(path).map_err(|e| RenderError::Read {
                path: path.clone(),
                source: e,
            })?;
            sources.push((template_name(path, templates_dir, source_root), content));
        }

        let mut base = Tera::default();
        // Autoescaping turns the slashes of asset URLs into entities.
        base.autoescape_on(Vec::new());
        base.add_raw_templates(sources)
            .map_err(|e| RenderError::template("layouts", &e))?;

        Ok(Self { base })
    }

    /// Expose `asset(path=...)` and `icon(name=...)` to templates.
    pub fn register_functions(&mut self, index: Arc<AssetIndex>, sprite_url: String) {
        self.base.register_function("asset", AssetFunction { index });
        self.base.register_function("icon", IconFunction { sprite_url });
    }

    /// Render one page.
    pub fn render_page(&self, page: &PageDescriptor, context: &PageContext) -> Result<String, RenderError> {
        let source = std::fs::read_to_string(&page.template_path).map_err(|e| RenderError::Read {
            path: page.template_path.clone(),
            source: e,
        })?;

        let mut tera = self.base.clone();
        tera.add_raw_template(&page.template_name, &source)
            .map_err(|e| RenderError::template(&page.template_name, &e))?;

        let tera_context =
            Context::from_serialize(context).map_err(|e| RenderError::template(&page.template_name, &e))?;
        tera.render(&page.template_name, &tera_context)
            .map_err(|e| RenderError::template(&page.template_name, &e))
    }
}

fn collect_templates(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| RenderError::Read {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| RenderError::Read {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_templates(&path, extension, files)?;
        } else if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    Ok(())
}

// =============================================================================
// Template functions
// =============================================================================

/// `asset(path="img/cat.jpg")` - output URL of a source asset.
struct AssetFunction {
    index: Arc<AssetIndex>,
}

impl tera::Function for AssetFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("asset() requires a `path` argument"))?;

        match self.index.resolve(path, Path::new("")) {
            Resolution::Resolved(url) => Ok(Value::String(url)),
            Resolution::Untouched => Ok(Value::String(path.to_string())),
            Resolution::Unknown => Err(tera::Error::msg(format!("unknown asset '{path}'"))),
        }
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// `icon(name="home")` - sprite symbol URL, checked after the sprite is built.
struct IconFunction {
    sprite_url: String,
}

impl tera::Function for IconFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("icon() requires a `name` argument"))?;
        Ok(Value::String(format!("{}#{}", self.sprite_url, name)))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::asset::{AssetPayload, AssetReference, MimeClass, TransformedAsset};
    use crate::build::discover::{RenderOptions, discover_pages};
    use crate::config::HtmlConfig;
    use std::collections::BTreeMap;
    use std::fs;

    struct Site {
        dir: tempfile::TempDir,
    }

    impl Site {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("templates/pages")).unwrap();
            Self { dir }
        }

        fn write(&self, relative: &str, content: &str) {
            fs::write(self.dir.path().join(relative), content).unwrap();
        }

        fn templates(&self) -> PathBuf {
            self.dir.path().join("templates")
        }

        fn pages(&self) -> Vec<PageDescriptor> {
            discover_pages(
                &self.templates().join("pages"),
                &self.templates(),
                self.dir.path(),
                "html",
                &RenderOptions::from(&HtmlConfig::default()),
            )
            .unwrap()
        }

        fn renderer(&self) -> Renderer {
            let mut renderer = Renderer::new(&self.templates(), self.dir.path(), "html", &self.pages()).unwrap();
            let mut assets = BTreeMap::new();
            assets.insert(
                PathBuf::from("img/cat.jpg"),
                TransformedAsset {
                    reference: AssetReference::new(
                        "img/cat.jpg".into(),
                        Some("img/cat.jpg".into()),
                        b"cat",
                        MimeClass::Image,
                    ),
                    payload: AssetPayload::File(Vec::new()),
                },
            );
            renderer.register_functions(Arc::new(AssetIndex::new(&assets, Vec::new())), "img/sprite.svg".into());
            renderer
        }
    }

    fn context(name: &str) -> PageContext {
        PageContext {
            page: PageInfo {
                name: name.to_string(),
                output: format!("{name}.html"),
            },
            mode: "development".to_string(),
            assets: AssetsContext {
                styles: vec!["css/index.css".into()],
                scripts: Vec::new(),
            },
        }
    }

    #[test]
    fn test_render_with_layout_and_partial() {
        let site = Site::new();
        site.write(
            "templates/base.html",
            "<html><head>{% for s in assets.styles %}<link href=\"{{ s }}\">{% endfor %}</head><body>{% block body %}{% endblock %}</body></html>",
        );
        site.write("templates/pages/_hero.html", "<h1>{{ page.name }}</h1>");
        site.write(
            "templates/pages/index.html",
            "{% extends \"base.html\" %}{% block body %}{% include \"pages/_hero.html\" %}<img src=\"{{ asset(path='img/cat.jpg') }}\"><use href=\"{{ icon(name='home') }}\">{% endblock %}",
        );

        let pages = site.pages();
        let html = site.renderer().render_page(&pages[0], &context("index")).unwrap();
        assert_eq!(
            html,
            "<html><head><link href=\"css/index.css\"></head><body><h1>index</h1><img src=\"img/cat.jpg\"><use href=\"img/sprite.svg#home\"></body></html>"
        );
    }

    #[test]
    fn test_broken_page_does_not_affect_others() {
        let site = Site::new();
        site.write("templates/pages/about.html", "{% if %}");
        site.write("templates/pages/index.html", "<p>{{ mode }}</p>");

        let pages = site.pages();
        let renderer = site.renderer();

        let err = renderer.render_page(&pages[0], &context("about")).unwrap_err();
        assert!(matches!(err, RenderError::Template { ref template, .. } if template == "pages/about.html"));
        assert_eq!(
            renderer.render_page(&pages[1], &context("index")).unwrap(),
            "<p>development</p>"
        );
    }

    #[test]
    fn test_unknown_asset_fails_render() {
        let site = Site::new();
        site.write("templates/pages/index.html", "{{ asset(path='img/dog.jpg') }}");

        let pages = site.pages();
        let err = site.renderer().render_page(&pages[0], &context("index")).unwrap_err();
        assert!(err.to_string().contains("unknown asset 'img/dog.jpg'"));
    }
}
