//! HTML post-processing of rendered pages.
//!
//! Runs in this order on every page:
//!
//! 1. asset references in tag attributes are resolved to output URLs
//! 2. raster `<img>` elements gain a `<picture>` wrapper with a webp source
//! 3. production only: `URL?as=webp` becomes the webp derivative's URL
//! 4. bundle `<link>`/`<script>` tags are injected before `</head>`
//! 5. development only: the live reload snippet goes before `</body>`
//! 6. production only: comments are stripped
//!
//! Tags are located with regular expressions rather than a full HTML parse,
//! so untouched markup comes out byte-for-byte as it went in.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::asset::{TransformedAsset, has_webp_variant, webp_path};
use super::paths::{is_external_reference, normalize, split_query, to_url};

/// SSE endpoint pages subscribe to for reload notifications.
pub const LIVE_RELOAD_PATH: &str = "/_assetline/live-reload";

static ASSET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(img|source|video|link|a)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
    )
    .expect("valid regex")
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});
static PICTURE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<picture\b(?:"[^"]*"|'[^']*'|[^'">])*>|</picture\s*>|<img\b((?:"[^"]*"|'[^']*'|[^'">])*)>"#)
        .expect("valid regex")
});
static WEBP_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([^\s"'=,]+?)\?as=webp"#).expect("valid regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--(.*?)-->").expect("valid regex"));
static HEAD_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("valid regex"));
static BODY_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("valid regex"));

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HtmlError {
    #[error("{page}: unknown asset reference '{reference}'")]
    UnknownReference { page: String, reference: String },
}

// =============================================================================
// Asset lookup
// =============================================================================

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// External, or an artifact that only exists after rendering
    Untouched,
    Resolved(String),
    Unknown,
}

/// Maps source-relative asset paths to the URLs they are emitted under.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    urls: HashMap<PathBuf, String>,
    deferred: Vec<String>,
}

impl AssetIndex {
    /// Index every asset emitted as a file of its own.
    ///
    /// `deferred` lists output URLs that pages may reference before they
    /// exist (the sprite sheet).
    pub fn new(assets: &BTreeMap<PathBuf, TransformedAsset>, deferred: Vec<String>) -> Self {
        let urls = assets
            .iter()
            .filter_map(|(path, asset)| asset.reference.url().map(|url| (path.clone(), url)))
            .collect();
        Self { urls, deferred }
    }

    pub fn url_of(&self, source_path: &Path) -> Option<&str> {
        self.urls.get(source_path).map(String::as_str)
    }

    /// Resolve a reference found in a page living in `page_dir`.
    ///
    /// `@/x` and `/x` resolve from the source root; anything else is tried
    /// relative to `page_dir` first, then from the source root. A query
    /// string is carried over to the resolved URL.
    pub fn resolve(&self, reference: &str, page_dir: &Path) -> Resolution {
        let reference = reference.trim();
        if is_external_reference(reference) {
            return Resolution::Untouched;
        }
        let (path, query) = split_query(reference);

        let candidates: Vec<PathBuf> = match path.strip_prefix("@/").or_else(|| path.strip_prefix('/')) {
            Some(rest) => vec![PathBuf::from(rest)],
            None => vec![page_dir.join(path), PathBuf::from(path)],
        };
        let candidates: Vec<PathBuf> = candidates.iter().filter_map(|c| normalize(c)).collect();
        if candidates.iter().any(|c| self.is_deferred(c)) {
            return Resolution::Untouched;
        }

        let found = candidates
            .iter()
            .find_map(|candidate| self.url_of(candidate).map(str::to_string));

        match (found, query) {
            (Some(url), Some(query)) => Resolution::Resolved(format!("{url}?{query}")),
            (Some(url), None) => Resolution::Resolved(url),
            (None, _) => Resolution::Unknown,
        }
    }

    fn is_deferred(&self, path: &Path) -> bool {
        let url = to_url(path);
        self.deferred.iter().any(|d| *d == url)
    }
}

// =============================================================================
// Post-processing
// =============================================================================

/// Page-independent post-processing switches.
#[derive(Debug, Clone)]
pub struct PostProcessOptions {
    pub production: bool,
    pub lightbox_attribute: String,
    /// Wrap raster images in `<picture>` with a webp source
    pub webp: bool,
    pub inject: bool,
    pub remove_comments: bool,
    pub live_reload: bool,
}

/// Bundle URLs to inject, in load order.
#[derive(Debug, Clone, Default)]
pub struct InjectedAssets {
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
}

/// Run every post-processing step on a rendered page.
pub fn post_process(
    html: &str,
    page: &str,
    page_dir: &Path,
    index: &AssetIndex,
    injected: &InjectedAssets,
    options: &PostProcessOptions,
) -> Result<String, HtmlError> {
    let mut html = resolve_references(html, page, page_dir, index, &options.lightbox_attribute)?;
    if options.webp {
        html = wrap_pictures(&html);
        if options.production {
            html = resolve_modern_formats(&html);
        }
    }
    if options.inject {
        html = inject_bundles(&html, injected);
    }
    if options.live_reload && !options.production {
        html = inject_live_reload(&html);
    }
    if options.remove_comments && options.production {
        html = strip_comments(&html);
    }
    Ok(html)
}

/// Rewrite asset references in `img[src]`, `source[srcset]`, `video[poster]`,
/// icon `link[href]` and lightbox `a[href]`.
pub fn resolve_references(
    html: &str,
    page: &str,
    page_dir: &Path,
    index: &AssetIndex,
    lightbox_attribute: &str,
) -> Result<String, HtmlError> {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    for captures in ASSET_TAG.captures_iter(html) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let mut tag = Tag::from_captures(&captures);
        let Some(attribute) = tag.reference_attribute(lightbox_attribute) else {
            continue;
        };
        let Some(value) = tag.get(attribute).map(str::to_string) else {
            continue;
        };

        let rewritten = if attribute == "srcset" {
            resolve_srcset(&value, page, page_dir, index)?
        } else {
            resolve_one(&value, page, page_dir, index)?
        };
        if rewritten == value {
            continue;
        }

        tag.set(attribute, rewritten);
        out.push_str(&html[cursor..whole.start()]);
        out.push_str(&tag.render());
        cursor = whole.end();
    }

    out.push_str(&html[cursor..]);
    Ok(out)
}

fn resolve_one(reference: &str, page: &str, page_dir: &Path, index: &AssetIndex) -> Result<String, HtmlError> {
    match index.resolve(reference, page_dir) {
        Resolution::Untouched => Ok(reference.to_string()),
        Resolution::Resolved(url) => Ok(url),
        Resolution::Unknown => Err(HtmlError::UnknownReference {
            page: page.to_string(),
            reference: reference.to_string(),
        }),
    }
}

/// Resolve each candidate of a `srcset` list, keeping its descriptor.
fn resolve_srcset(srcset: &str, page: &str, page_dir: &Path, index: &AssetIndex) -> Result<String, HtmlError> {
    let candidates = srcset
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|candidate| {
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, descriptor)) => (url, Some(descriptor.trim())),
                None => (candidate, None),
            };
            let url = resolve_one(url, page, page_dir, index)?;
            Ok(match descriptor {
                Some(d) => format!("{url} {d}"),
                None => url,
            })
        })
        .collect::<Result<Vec<_>, HtmlError>>()?;
    Ok(candidates.join(", "))
}

/// Wrap every raster `<img>` that is not already inside a `<picture>`.
pub fn wrap_pictures(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    let mut depth = 0usize;

    for captures in PICTURE_TOKEN.captures_iter(html) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let token = whole.as_str();
        if token.len() > 2 && token[..2].eq_ignore_ascii_case("</") {
            depth = depth.saturating_sub(1);
            continue;
        }
        let Some(attributes) = captures.get(1) else {
            depth += 1;
            continue;
        };
        if depth > 0 {
            continue;
        }

        let src = parse_attributes(attributes.as_str())
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("src"))
            .and_then(|(_, value)| value);
        let Some(src) = src else {
            continue;
        };
        if is_external_reference(&src) {
            continue;
        }
        let (path, _) = split_query(&src);
        if !has_webp_variant(Path::new(path)) {
            continue;
        }

        out.push_str(&html[cursor..whole.start()]);
        out.push_str(&format!(
            r#"<picture><source srcset="{path}?as=webp" type="image/webp">{token}</picture>"#
        ));
        cursor = whole.end();
    }

    out.push_str(&html[cursor..]);
    out
}

/// Replace `URL?as=webp` with the URL of the image's webp derivative.
pub fn resolve_modern_formats(html: &str) -> String {
    WEBP_QUERY
        .replace_all(html, |captures: &Captures<'_>| {
            let path = &captures[1];
            if has_webp_variant(Path::new(path)) {
                to_url(&webp_path(Path::new(path)))
            } else {
                captures[0].to_string()
            }
        })
        .into_owned()
}

/// Insert stylesheet and script tags for every bundle before `</head>`.
pub fn inject_bundles(html: &str, injected: &InjectedAssets) -> String {
    let mut tags = String::new();
    for href in &injected.styles {
        tags.push_str(&format!(r#"<link rel="stylesheet" href="{href}">"#));
    }
    for src in &injected.scripts {
        tags.push_str(&format!(r#"<script defer src="{src}"></script>"#));
    }
    if tags.is_empty() {
        return html.to_string();
    }
    insert_before(html, &HEAD_END, &tags, false)
}

pub fn inject_live_reload(html: &str) -> String {
    let snippet = format!(
        r#"<script>(function () {{ var source = new EventSource("{LIVE_RELOAD_PATH}"); source.addEventListener("reload", function () {{ window.location.reload(); }}); }})();</script>"#
    );
    insert_before(html, &BODY_END, &snippet, true)
}

/// Remove comments, keeping IE conditional comments.
pub fn strip_comments(html: &str) -> String {
    COMMENT
        .replace_all(html, |captures: &Captures<'_>| {
            let body = &captures[1];
            if body.starts_with("[if") || body.ends_with("<![endif]") {
                captures[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Insert `snippet` before the first match of `marker`, or at the start
/// (`append == false`) or end of the document when there is none.
fn insert_before(html: &str, marker: &Regex, snippet: &str, append: bool) -> String {
    let at = match marker.find(html) {
        Some(m) => m.start(),
        None if append => html.len(),
        None => 0,
    };
    let mut out = String::with_capacity(html.len() + snippet.len());
    out.push_str(&html[..at]);
    out.push_str(snippet);
    out.push_str(&html[at..]);
    out
}

// =============================================================================
// Tags
// =============================================================================

struct Tag {
    name: String,
    attributes: Vec<(String, Option<String>)>,
    self_closing: bool,
}

impl Tag {
    fn from_captures(captures: &Captures<'_>) -> Self {
        Self {
            name: captures[1].to_string(),
            attributes: parse_attributes(captures.get(2).map_or("", |m| m.as_str())),
            self_closing: captures.get(3).is_some_and(|m| !m.as_str().is_empty()),
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }

    fn has(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    fn set(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = Some(value),
            None => self.attributes.push((name.to_string(), Some(value))),
        }
    }

    /// The attribute holding an asset reference, if this tag carries one.
    fn reference_attribute(&self, lightbox_attribute: &str) -> Option<&'static str> {
        match self.name.to_ascii_lowercase().as_str() {
            "img" => Some("src"),
            "source" => Some("srcset"),
            "video" => Some("poster"),
            "link" => {
                let rel = self.get("rel").unwrap_or_default().to_ascii_lowercase();
                rel.split_whitespace()
                    .any(|token| token.contains("icon"))
                    .then_some("href")
            }
            "a" if self.has(lightbox_attribute) => Some("href"),
            _ => None,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (name, value) in &self.attributes {
            match value {
                Some(v) if v.contains('"') => out.push_str(&format!(" {name}='{v}'")),
                Some(v) => out.push_str(&format!(" {name}=\"{v}\"")),
                None => out.push_str(&format!(" {name}")),
            }
        }
        out.push_str(if self.self_closing { " />" } else { ">" });
        out
    }
}

fn parse_attributes(text: &str) -> Vec<(String, Option<String>)> {
    ATTRIBUTE
        .captures_iter(text)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4));
            (c[1].to_string(), value.map(|m| m.as_str().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::asset::{AssetPayload, AssetReference, MimeClass};

    fn index() -> AssetIndex {
        let assets: BTreeMap<PathBuf, TransformedAsset> = ["img/cat.jpg", "img/logo.png", "img/anim.gif", "img/favicon.ico"]
            .into_iter()
            .map(|path| {
                let asset = TransformedAsset {
                    reference: AssetReference::new(path.into(), Some(path.into()), path.as_bytes(), MimeClass::Image),
                    payload: AssetPayload::File(Vec::new()),
                };
                (PathBuf::from(path), asset)
            })
            .collect();
        AssetIndex::new(&assets, vec!["img/sprite.svg".to_string()])
    }

    fn page_dir() -> PathBuf {
        PathBuf::from("templates/pages")
    }

    #[test]
    fn test_resolve_variants() {
        let index = index();
        let dir = page_dir();
        assert_eq!(index.resolve("@/img/cat.jpg", &dir), Resolution::Resolved("img/cat.jpg".into()));
        assert_eq!(index.resolve("/img/cat.jpg", &dir), Resolution::Resolved("img/cat.jpg".into()));
        assert_eq!(index.resolve("../../img/cat.jpg", &dir), Resolution::Resolved("img/cat.jpg".into()));
        assert_eq!(index.resolve("img/cat.jpg?as=webp", &dir), Resolution::Resolved("img/cat.jpg?as=webp".into()));
        assert_eq!(index.resolve("https://x.org/a.jpg", &dir), Resolution::Untouched);
        assert_eq!(index.resolve("img/sprite.svg#home", &dir), Resolution::Untouched);
        assert_eq!(index.resolve("../../img/sprite.svg#home", &dir), Resolution::Untouched);
        assert_eq!(index.resolve("img/dog.jpg", &dir), Resolution::Unknown);
    }

    #[test]
    fn test_resolve_references_in_tags() {
        let html = r#"<link rel="shortcut icon" href="@/img/favicon.ico"><link rel="stylesheet" href="x.css">
<a href="../../img/cat.jpg" data-lightbox="set"><img src='../../img/logo.png' alt="Logo"/></a>
<a href="about.html">About</a><video poster="/img/cat.jpg"></video>"#;

        let out = resolve_references(html, "index.html", &page_dir(), &index(), "data-lightbox").unwrap();
        assert_eq!(
            out,
            r#"<link rel="shortcut icon" href="img/favicon.ico"><link rel="stylesheet" href="x.css">
<a href="img/cat.jpg" data-lightbox="set"><img src="img/logo.png" alt="Logo" /></a>
<a href="about.html">About</a><video poster="img/cat.jpg"></video>"#
        );
    }

    #[test]
    fn test_unknown_reference_names_page() {
        let err = resolve_references(r#"<img src="img/dog.jpg">"#, "about.html", &page_dir(), &index(), "data-lightbox")
            .unwrap_err();
        assert_eq!(err.to_string(), "about.html: unknown asset reference 'img/dog.jpg'");
    }

    #[test]
    fn test_srcset_candidates() {
        let out = resolve_references(
            r#"<source srcset="@/img/cat.jpg 1x, @/img/logo.png 2x">"#,
            "index.html",
            &page_dir(),
            &index(),
            "data-lightbox",
        )
        .unwrap();
        assert_eq!(out, r#"<source srcset="img/cat.jpg 1x, img/logo.png 2x">"#);
    }

    #[test]
    fn test_wrap_pictures() {
        let html = r#"<img src="img/cat.jpg" alt="Cat"><img src="img/anim.gif"><picture><img src="img/logo.png"></picture>"#;
        assert_eq!(
            wrap_pictures(html),
            r#"<picture><source srcset="img/cat.jpg?as=webp" type="image/webp"><img src="img/cat.jpg" alt="Cat"></picture><img src="img/anim.gif"><picture><img src="img/logo.png"></picture>"#
        );
    }

    #[test]
    fn test_wrap_pictures_skips_external() {
        let html = r#"<img src="https://cdn.example.com/a.jpg">"#;
        assert_eq!(wrap_pictures(html), html);
    }

    #[test]
    fn test_resolve_modern_formats() {
        let html = r#"<source srcset="img/cat.jpg?as=webp" type="image/webp">"#;
        assert_eq!(
            resolve_modern_formats(html),
            r#"<source srcset="img/cat.webp" type="image/webp">"#
        );
    }

    #[test]
    fn test_inject_bundles_before_head_end() {
        let injected = InjectedAssets {
            styles: vec!["css/index.css".into()],
            scripts: vec!["vendors.js".into(), "index.js".into()],
        };
        let out = inject_bundles("<html><head><title>x</title></head><body></body></html>", &injected);
        assert_eq!(
            out,
            r#"<html><head><title>x</title><link rel="stylesheet" href="css/index.css"><script defer src="vendors.js"></script><script defer src="index.js"></script></head><body></body></html>"#
        );
    }

    #[test]
    fn test_live_reload_before_body_end() {
        let out = inject_live_reload("<body><p>x</p></BODY>");
        assert!(out.contains(LIVE_RELOAD_PATH));
        assert!(out.ends_with("</script></BODY>"));
    }

    #[test]
    fn test_strip_comments_keeps_conditionals() {
        let html = "<!-- note --><p>a</p><!--[if IE]><p>ie</p><![endif]-->";
        assert_eq!(strip_comments(html), "<p>a</p><!--[if IE]><p>ie</p><![endif]-->");
    }

    #[test]
    fn test_post_process_production() {
        let options = PostProcessOptions {
            production: true,
            lightbox_attribute: "data-lightbox".into(),
            webp: true,
            inject: false,
            remove_comments: true,
            live_reload: true,
        };
        let out = post_process(
            r#"<body><!-- hero --><img src="../../img/cat.jpg"></body>"#,
            "index.html",
            &page_dir(),
            &index(),
            &InjectedAssets::default(),
            &options,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"<body><picture><source srcset="img/cat.webp" type="image/webp"><img src="img/cat.jpg"></picture></body>"#
        );
    }
}
