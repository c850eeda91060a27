//! Chunk splitting, concatenation and naming.
//!
//! Every entry's module walk is placed into chunks:
//!
//! - vendored scripts go to `vendors`
//! - modules reachable from two or more entries go to `common`
//! - everything else stays in the entry's own chunk
//!
//! Chunks are ordered `vendors`, `common`, then entries in declared order,
//! which is also the order pages load them in. Script chunks holding
//! registry modules start with the registry prelude, and each entry chunk
//! ends by requiring its entry modules.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::asset::{AssetPayload, TransformedAsset};
use super::context::BuildMode;
use super::graph::{Entry, ModuleGraph, ModuleKind};
use super::hash::{ContentHash, hashed_path};
use super::paths::to_url;
use super::runtime;

pub const VENDORS_CHUNK: &str = "vendors";
pub const COMMON_CHUNK: &str = "common";

#[derive(thiserror::Error, Debug)]
pub enum BundleError {
    #[error("entry '{entry}': module {} does not exist", module.display())]
    UnknownEntryModule { entry: String, module: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Script,
    Stylesheet,
}

/// A bundle written as one output file.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Member modules in concatenation order
    pub modules: Vec<PathBuf>,
    pub content: String,
    /// Output-relative file name, set by the fingerprint stage
    pub file_name: Option<PathBuf>,
}

impl Chunk {
    /// Unhashed output path: `NAME.js` or `css/NAME.css`.
    pub fn base_path(&self) -> PathBuf {
        match self.kind {
            ChunkKind::Script => PathBuf::from(format!("{}.js", self.name)),
            ChunkKind::Stylesheet => Path::new("css").join(format!("{}.css", self.name)),
        }
    }

    /// Name the chunk; production names carry a hash of the final content.
    pub fn assign_file_name(&mut self, mode: BuildMode) {
        let base = self.base_path();
        self.file_name = Some(if mode.is_production() {
            hashed_path(&base, ContentHash::of(self.content.as_bytes()))
        } else {
            base
        });
    }

    pub fn url(&self) -> Option<String> {
        self.file_name.as_deref().map(to_url)
    }
}

/// Split the walked entries into ordered chunks and concatenate their content.
///
/// Empty chunks are dropped.
pub fn split_chunks(
    graph: &ModuleGraph,
    entries: &[Entry],
    assets: &BTreeMap<PathBuf, TransformedAsset>,
) -> Vec<Chunk> {
    let walks: Vec<(&Entry, Vec<PathBuf>)> = entries
        .iter()
        .map(|entry| (entry, graph.walk(&entry.modules)))
        .collect();

    let mut reach: HashMap<&Path, usize> = HashMap::new();
    for (_, walk) in &walks {
        for module in walk {
            *reach.entry(module.as_path()).or_default() += 1;
        }
    }

    // chunk name -> (script modules, stylesheet modules)
    let mut placed: HashMap<String, (Vec<PathBuf>, Vec<PathBuf>)> = HashMap::new();
    for (entry, walk) in &walks {
        for module in walk {
            let Some(node) = graph.get(module) else {
                continue;
            };
            let chunk_name = if node.vendored {
                VENDORS_CHUNK
            } else if reach.get(module.as_path()).copied().unwrap_or(0) >= 2 {
                COMMON_CHUNK
            } else {
                entry.name.as_str()
            };

            let (scripts, styles) = placed.entry(chunk_name.to_string()).or_default();
            let bucket = match node.kind {
                ModuleKind::Script => scripts,
                ModuleKind::Stylesheet => styles,
            };
            if !bucket.contains(module) {
                bucket.push(module.clone());
            }
        }
    }

    let mut order = vec![VENDORS_CHUNK.to_string(), COMMON_CHUNK.to_string()];
    order.extend(entries.iter().map(|e| e.name.clone()));

    let mut chunks = Vec::new();
    for name in order {
        let (scripts, styles) = placed.remove(&name).unwrap_or_default();
        let roots = entries
            .iter()
            .find(|e| e.name == name)
            .map(|entry| registry_roots(graph, entry))
            .unwrap_or_default();

        if !styles.is_empty() {
            let content = concatenate(ModuleKind::Stylesheet, &styles, assets);
            chunks.push(Chunk {
                name: name.clone(),
                kind: ChunkKind::Stylesheet,
                modules: styles,
                content,
                file_name: None,
            });
        }
        if !scripts.is_empty() || !roots.is_empty() {
            let mut content = String::new();
            if !roots.is_empty() || scripts.iter().any(|m| !is_vendored(graph, m)) {
                content.push_str(runtime::PRELUDE);
            }
            content.push_str(&concatenate(ModuleKind::Script, &scripts, assets));
            for root in &roots {
                content.push_str(&runtime::require_entry(root));
            }
            chunks.push(Chunk {
                name,
                kind: ChunkKind::Script,
                modules: scripts,
                content,
                file_name: None,
            });
        }
    }
    chunks
}

/// Entry modules that run through the registry, in declared order.
fn registry_roots(graph: &ModuleGraph, entry: &Entry) -> Vec<PathBuf> {
    entry
        .modules
        .iter()
        .filter(|m| {
            graph
                .get(m)
                .is_some_and(|node| node.kind == ModuleKind::Script && !node.vendored)
        })
        .cloned()
        .collect()
}

fn is_vendored(graph: &ModuleGraph, module: &Path) -> bool {
    graph.get(module).is_some_and(|node| node.vendored)
}

fn concatenate(kind: ModuleKind, modules: &[PathBuf], assets: &BTreeMap<PathBuf, TransformedAsset>) -> String {
    let mut out = String::new();
    for module in modules {
        let Some(asset) = assets.get(module) else {
            continue;
        };
        let code = match (&asset.payload, kind) {
            (AssetPayload::Script(script), ModuleKind::Script) => script.code.as_str(),
            (AssetPayload::Stylesheet(css), ModuleKind::Stylesheet) => css.as_str(),
            _ => continue,
        };
        let code = code.trim_end();
        out.push_str(code);
        // a vendored script without a trailing semicolon must not run into the next module
        if kind == ModuleKind::Script && !code.is_empty() && !code.ends_with([';', '}']) {
            out.push(';');
        }
        out.push('\n');
    }
    out
}

/// Compiled stylesheets that no chunk includes.
pub fn unbundled_stylesheets<'a>(
    chunks: &[Chunk],
    assets: &'a BTreeMap<PathBuf, TransformedAsset>,
) -> Vec<&'a Path> {
    assets
        .iter()
        .filter(|(_, asset)| matches!(asset.payload, AssetPayload::Stylesheet(_)))
        .map(|(path, _)| path.as_path())
        .filter(|path| !chunks.iter().any(|c| c.modules.iter().any(|m| m == path)))
        .collect()
}

/// Chunk URLs in injection order.
pub fn chunk_urls(chunks: &[Chunk], kind: ChunkKind) -> Vec<String> {
    chunks
        .iter()
        .filter(|c| c.kind == kind)
        .filter_map(|c| c.url())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::graph::tests::{script, stylesheet};

    fn entry(name: &str, module: &str) -> Entry {
        Entry {
            name: name.to_string(),
            modules: vec![PathBuf::from(module)],
        }
    }

    fn fixture() -> BTreeMap<PathBuf, TransformedAsset> {
        [
            script("js/index.js", &["js/vendor/polyfill.js", "js/shared.js"], &["style/index.scss"], false),
            script("js/script.js", &["js/shared.js"], &[], false),
            script("js/shared.js", &[], &["style/base.scss"], false),
            script("js/vendor/polyfill.js", &[], &[], true),
            stylesheet("style/index.scss"),
            stylesheet("style/base.scss"),
        ]
        .into_iter()
        .collect()
    }

    fn summary(chunks: &[Chunk]) -> Vec<(String, ChunkKind, Vec<PathBuf>)> {
        chunks
            .iter()
            .map(|c| (c.name.clone(), c.kind, c.modules.clone()))
            .collect()
    }

    #[test]
    fn test_split_vendors_common_entries() {
        let assets = fixture();
        let graph = ModuleGraph::from_assets(&assets);
        let entries = vec![entry("index", "js/index.js"), entry("script", "js/script.js")];

        let chunks = split_chunks(&graph, &entries, &assets);
        assert_eq!(
            summary(&chunks),
            vec![
                ("vendors".into(), ChunkKind::Script, vec![PathBuf::from("js/vendor/polyfill.js")]),
                ("common".into(), ChunkKind::Stylesheet, vec![PathBuf::from("style/base.scss")]),
                ("common".into(), ChunkKind::Script, vec![PathBuf::from("js/shared.js")]),
                ("index".into(), ChunkKind::Stylesheet, vec![PathBuf::from("style/index.scss")]),
                ("index".into(), ChunkKind::Script, vec![PathBuf::from("js/index.js")]),
                ("script".into(), ChunkKind::Script, vec![PathBuf::from("js/script.js")]),
            ]
        );
    }

    #[test]
    fn test_single_entry_has_no_common_chunk() {
        let assets = fixture();
        let graph = ModuleGraph::from_assets(&assets);
        let chunks = split_chunks(&graph, &[entry("index", "js/index.js")], &assets);

        assert!(chunks.iter().all(|c| c.name != COMMON_CHUNK));
        let index_js = chunks
            .iter()
            .find(|c| c.name == "index" && c.kind == ChunkKind::Script)
            .unwrap();
        assert_eq!(index_js.modules, vec![PathBuf::from("js/shared.js"), PathBuf::from("js/index.js")]);
        assert!(index_js.content.find("js/shared.js").unwrap() < index_js.content.find("js/index.js").unwrap());
    }

    fn script_chunk<'c>(chunks: &'c [Chunk], name: &str) -> &'c Chunk {
        chunks
            .iter()
            .find(|c| c.name == name && c.kind == ChunkKind::Script)
            .unwrap()
    }

    #[test]
    fn test_registry_prelude_and_entry_requires() {
        let assets = fixture();
        let graph = ModuleGraph::from_assets(&assets);
        let entries = vec![entry("index", "js/index.js"), entry("script", "js/script.js")];
        let chunks = split_chunks(&graph, &entries, &assets);

        let vendors = script_chunk(&chunks, VENDORS_CHUNK);
        assert!(!vendors.content.contains("__assetline"));
        let common = script_chunk(&chunks, COMMON_CHUNK);
        assert!(common.content.starts_with(runtime::PRELUDE));
        assert!(!common.content.contains("__assetline.require("));

        let index = script_chunk(&chunks, "index");
        assert!(index.content.starts_with(runtime::PRELUDE));
        assert!(index.content.ends_with("__assetline.require(\"js/index.js\");\n"));
    }

    #[test]
    fn test_entry_chunk_exists_when_its_module_is_shared() {
        let assets: BTreeMap<_, _> = [
            script("js/a.js", &["js/b.js"], &[], false),
            script("js/b.js", &[], &[], false),
        ]
        .into_iter()
        .collect();
        let graph = ModuleGraph::from_assets(&assets);
        let entries = vec![entry("a", "js/a.js"), entry("b", "js/b.js")];
        let chunks = split_chunks(&graph, &entries, &assets);

        assert_eq!(script_chunk(&chunks, COMMON_CHUNK).modules, vec![PathBuf::from("js/b.js")]);
        let b = script_chunk(&chunks, "b");
        assert!(b.modules.is_empty());
        assert!(b.content.ends_with("__assetline.require(\"js/b.js\");\n"));
    }

    #[test]
    fn test_unbundled_stylesheets() {
        let mut assets = fixture();
        let orphan = stylesheet("style/orphan.scss");
        assets.insert(orphan.0, orphan.1);
        let graph = ModuleGraph::from_assets(&assets);
        let chunks = split_chunks(&graph, &[entry("index", "js/index.js")], &assets);

        assert_eq!(unbundled_stylesheets(&chunks, &assets), vec![Path::new("style/orphan.scss")]);
    }

    #[test]
    fn test_file_names_by_mode() {
        let mut chunk = Chunk {
            name: "index".into(),
            kind: ChunkKind::Stylesheet,
            modules: Vec::new(),
            content: "body{}".into(),
            file_name: None,
        };

        chunk.assign_file_name(BuildMode::Development);
        assert_eq!(chunk.url().as_deref(), Some("css/index.css"));

        chunk.assign_file_name(BuildMode::Production);
        let hash = ContentHash::of(b"body{}").short();
        assert_eq!(chunk.url(), Some(format!("css/index.{hash}.css")));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let mut a = Chunk {
            name: "index".into(),
            kind: ChunkKind::Script,
            modules: Vec::new(),
            content: "a()".into(),
            file_name: None,
        };
        let mut b = a.clone();
        b.content = "b()".into();
        a.assign_file_name(BuildMode::Production);
        b.assign_file_name(BuildMode::Production);
        assert_ne!(a.file_name, b.file_name);
    }

    #[test]
    fn test_chunk_urls_preserve_order() {
        let assets = fixture();
        let graph = ModuleGraph::from_assets(&assets);
        let entries = vec![entry("index", "js/index.js"), entry("script", "js/script.js")];
        let mut chunks = split_chunks(&graph, &entries, &assets);
        for chunk in &mut chunks {
            chunk.assign_file_name(BuildMode::Development);
        }

        assert_eq!(
            chunk_urls(&chunks, ChunkKind::Script),
            vec!["vendors.js", "common.js", "index.js", "script.js"]
        );
        assert_eq!(
            chunk_urls(&chunks, ChunkKind::Stylesheet),
            vec!["css/common.css", "css/index.css"]
        );
    }
}
