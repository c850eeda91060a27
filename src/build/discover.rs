//! Page discovery.
//!
//! Selects page templates from the pages directory. Files whose name starts
//! with `_` are partials: they can be included by other templates but are
//! never rendered on their own.

use std::path::{Path, PathBuf};

use crate::config::HtmlConfig;

use super::paths::{page_output_path, to_url};

#[derive(thiserror::Error, Debug)]
pub enum DiscoverError {
    #[error("pages directory does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("pages path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-page rendering switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Insert chunk tags before `</head>`
    pub inject: bool,
    /// Strip comments (production only)
    pub remove_comments: bool,
}

impl From<&HtmlConfig> for RenderOptions {
    fn from(config: &HtmlConfig) -> Self {
        Self {
            inject: config.inject,
            remove_comments: config.remove_comments,
        }
    }
}

/// A page to render: created once during discovery, then read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Absolute path of the template file
    pub template_path: PathBuf,
    /// Name the template is registered under in the renderer
    pub template_name: String,
    /// Output-relative path of the rendered page
    pub output_path: PathBuf,
    pub render_options: RenderOptions,
}

impl PageDescriptor {
    /// Directory of the page template relative to `source_root`, used to
    /// resolve relative asset references.
    pub fn source_dir(&self, source_root: &Path) -> PathBuf {
        self.template_path
            .parent()
            .and_then(|p| p.strip_prefix(source_root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Whether a file name is a page template (right extension, not a partial).
pub fn is_page_template(file_name: &str, extension: &str) -> bool {
    !file_name.starts_with('_')
        && !file_name.starts_with('.')
        && Path::new(file_name)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Discover the page templates of a directory.
///
/// Returns one descriptor per matching file, sorted by file name so builds
/// are reproducible. Non-matching files are skipped silently.
pub fn discover_pages(
    pages_dir: &Path,
    templates_dir: &Path,
    source_root: &Path,
    extension: &str,
    options: &RenderOptions,
) -> Result<Vec<PageDescriptor>, DiscoverError> {
    if !pages_dir.exists() {
        return Err(DiscoverError::PathNotFound(pages_dir.to_path_buf()));
    }
    if !pages_dir.is_dir() {
        return Err(DiscoverError::NotADirectory(pages_dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(pages_dir).map_err(|e| DiscoverError::ReadDir {
        path: pages_dir.to_path_buf(),
        source: e,
    })?;

    let mut pages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DiscoverError::ReadDir {
            path: pages_dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !is_page_template(&file_name, extension) {
            continue;
        }

        pages.push(PageDescriptor {
            template_name: template_name(&path, templates_dir, source_root),
            output_path: page_output_path(&path),
            template_path: path,
            render_options: options.clone(),
        });
    }

    pages.sort_by(|a, b| a.template_path.file_name().cmp(&b.template_path.file_name()));
    Ok(pages)
}

/// Renderer name of a template: relative to the templates directory when it
/// lives there, otherwise relative to the source root.
pub fn template_name(path: &Path, templates_dir: &Path, source_root: &Path) -> String {
    let relative = path
        .strip_prefix(templates_dir)
        .or_else(|_| path.strip_prefix(source_root))
        .unwrap_or(path);
    to_url(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn options() -> RenderOptions {
        RenderOptions::from(&HtmlConfig::default())
    }

    #[test]
    fn test_is_page_template() {
        assert!(is_page_template("index.pug", "pug"));
        assert!(is_page_template("About.PUG", "pug"));
        assert!(!is_page_template("_partial.pug", "pug"));
        assert!(!is_page_template("notes.txt", "pug"));
        assert!(!is_page_template(".hidden.pug", "pug"));
    }

    #[test]
    fn test_partials_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let pages_dir = templates.join("pages");
        fs::create_dir_all(&pages_dir).unwrap();
        fs::write(pages_dir.join("index.pug"), "").unwrap();
        fs::write(pages_dir.join("_partial.pug"), "").unwrap();

        let pages = discover_pages(&pages_dir, &templates, dir.path(), "pug", &options()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].output_path, PathBuf::from("index.html"));
        assert_eq!(pages[0].template_name, "pages/index.pug");
    }

    #[test]
    fn test_sorted_and_bijective() {
        let dir = tempfile::tempdir().unwrap();
        let pages_dir = dir.path().join("pages");
        fs::create_dir_all(pages_dir.join("nested")).unwrap();
        for name in ["zeta.html", "alpha.html", "mid.html", "readme.md", "_layout.html"] {
            fs::write(pages_dir.join(name), "").unwrap();
        }
        fs::write(pages_dir.join("nested/deep.html"), "").unwrap();

        let pages =
            discover_pages(&pages_dir, &pages_dir, dir.path(), "html", &options()).unwrap();
        let outputs: Vec<_> = pages.iter().map(|p| p.output_path.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("alpha.html"),
                PathBuf::from("mid.html"),
                PathBuf::from("zeta.html")
            ]
        );
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = discover_pages(&missing, &missing, dir.path(), "html", &options()).unwrap_err();
        assert!(matches!(err, DiscoverError::PathNotFound(_)));
    }

    #[test]
    fn test_source_dir() {
        let page = PageDescriptor {
            template_path: PathBuf::from("/p/src/templates/pages/index.html"),
            template_name: "pages/index.html".into(),
            output_path: PathBuf::from("index.html"),
            render_options: options(),
        };
        assert_eq!(
            page.source_dir(Path::new("/p/src")),
            PathBuf::from("templates/pages")
        );
    }
}
