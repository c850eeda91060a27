//! Path and URL conversion utilities.
//!
//! This module handles conversions between:
//! - Source file paths (relative paths within the source root)
//! - URL paths (how emitted files are referenced from pages)
//! - Output file paths (where files are written in the output directory)

use std::path::{Component, Path, PathBuf};

/// Convert a relative path to a URL path with forward slashes.
///
/// # Examples
/// ```ignore
/// to_url(Path::new("img/cat.jpg")) => "img/cat.jpg"
/// to_url(Path::new("css\\main.css")) => "css/main.css"
/// ```
pub fn to_url(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Output file name of a page template: the file name with its extension
/// replaced by `.html`.
///
/// # Examples
/// ```ignore
/// page_output_path("pages/index.pug") => "index.html"
/// page_output_path("about.html") => "about.html"
/// ```
pub fn page_output_path(template_path: &Path) -> PathBuf {
    let stem = template_path
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    PathBuf::from(stem).with_extension("html")
}

/// Whether a reference points outside the build (absolute URL, anchor, data URI).
pub fn is_external_reference(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with('#')
        || lower.starts_with("//")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("data:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("javascript:")
}

/// Lexically normalize a relative path, resolving `.` and `..`.
///
/// Returns `None` if the path escapes its root or is absolute.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Split a reference into its path and the query string (without `?`).
///
/// Fragments are dropped from the path part.
pub fn split_query(reference: &str) -> (&str, Option<&str>) {
    let without_fragment = reference.split('#').next().unwrap_or(reference);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    }
}

/// Get the base path from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_url() {
        assert_eq!(to_url(Path::new("img/cat.jpg")), "img/cat.jpg");
        assert_eq!(to_url(Path::new("index.html")), "index.html");
    }

    #[test]
    fn test_page_output_path() {
        assert_eq!(
            page_output_path(Path::new("pages/index.pug")),
            PathBuf::from("index.html")
        );
        assert_eq!(
            page_output_path(Path::new("about.html")),
            PathBuf::from("about.html")
        );
        assert_eq!(
            page_output_path(Path::new("contact.tera")),
            PathBuf::from("contact.html")
        );
    }

    #[test]
    fn test_is_external_reference() {
        assert!(is_external_reference("https://example.com/a.png"));
        assert!(is_external_reference("//cdn.example.com/a.png"));
        assert!(is_external_reference("#top"));
        assert!(is_external_reference("data:image/png;base64,AAAA"));
        assert!(is_external_reference("mailto:me@example.com"));
        assert!(!is_external_reference("img/cat.jpg"));
        assert!(!is_external_reference("../img/cat.jpg"));
        assert!(!is_external_reference("@/img/cat.jpg"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("templates/pages/../../img/cat.jpg")),
            Some(PathBuf::from("img/cat.jpg"))
        );
        assert_eq!(normalize(Path::new("./img/./a.png")), Some(PathBuf::from("img/a.png")));
        assert_eq!(normalize(Path::new("../outside.png")), None);
        assert_eq!(normalize(Path::new("/abs.png")), None);
    }

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("img/a.jpg?as=webp"), ("img/a.jpg", Some("as=webp")));
        assert_eq!(split_query("img/a.jpg"), ("img/a.jpg", None));
        assert_eq!(split_query("img/sprite.svg#home"), ("img/sprite.svg", None));
    }

    #[test]
    fn test_base_path_from_config() {
        assert_eq!(
            base_path_from_config(Path::new("/project/assetline.yaml")),
            PathBuf::from("/project")
        );
        assert_eq!(
            base_path_from_config(Path::new("assetline.yaml")),
            PathBuf::from("")
        );
    }
}
