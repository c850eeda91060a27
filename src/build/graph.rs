//! Module graph and entry points.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::EntryConfig;

use super::asset::{AssetPayload, TransformedAsset};
use super::bundle::BundleError;
use super::context::BuildContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Stylesheet,
}

/// One bundlable module and its outgoing edges.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub kind: ModuleKind,
    pub vendored: bool,
    /// Imported scripts followed by imported stylesheets, in import order
    pub deps: Vec<PathBuf>,
}

/// A named entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub modules: Vec<PathBuf>,
}

/// Script and stylesheet modules keyed by source-relative path.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: BTreeMap<PathBuf, ModuleNode>,
}

impl ModuleGraph {
    pub fn from_assets(assets: &BTreeMap<PathBuf, TransformedAsset>) -> Self {
        let nodes = assets
            .iter()
            .filter_map(|(path, asset)| {
                let node = match &asset.payload {
                    AssetPayload::Script(module) => ModuleNode {
                        kind: ModuleKind::Script,
                        vendored: module.vendored,
                        deps: module
                            .script_deps
                            .iter()
                            .chain(&module.style_deps)
                            .cloned()
                            .collect(),
                    },
                    AssetPayload::Stylesheet(_) => ModuleNode {
                        kind: ModuleKind::Stylesheet,
                        vendored: false,
                        deps: Vec::new(),
                    },
                    _ => return None,
                };
                Some((path.clone(), node))
            })
            .collect();
        Self { nodes }
    }

    pub fn get(&self, path: &Path) -> Option<&ModuleNode> {
        self.nodes.get(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Modules reachable from `roots`, dependencies before dependents.
    ///
    /// Each module appears once. Import cycles are cut at the first
    /// revisit. Modules missing from the graph (skipped after a transform
    /// error in development) are left out.
    pub fn walk(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for root in roots {
            self.visit(root, &mut visited, &mut order);
        }
        order
    }

    fn visit(&self, path: &Path, visited: &mut HashSet<PathBuf>, order: &mut Vec<PathBuf>) {
        if !visited.insert(path.to_path_buf()) {
            return;
        }
        let Some(node) = self.nodes.get(path) else {
            tracing::debug!(module = %path.display(), "module not in graph, skipping");
            return;
        };
        for dep in &node.deps {
            self.visit(dep, visited, order);
        }
        order.push(path.to_path_buf());
    }
}

/// Resolve the entry points of a build.
///
/// Configured entries are taken in declared order and must name existing
/// files. Without configuration every top-level script of the scripts
/// directory is an entry named after its file stem.
pub fn resolve_entries(
    configured: &[EntryConfig],
    assets: &BTreeMap<PathBuf, TransformedAsset>,
    ctx: &BuildContext,
) -> Result<Vec<Entry>, BundleError> {
    if !configured.is_empty() {
        return configured
            .iter()
            .map(|entry| {
                for module in &entry.modules {
                    if !ctx.source_path(module).is_file() {
                        return Err(BundleError::UnknownEntryModule {
                            entry: entry.name.clone(),
                            module: module.clone(),
                        });
                    }
                }
                Ok(Entry {
                    name: entry.name.clone(),
                    modules: entry.modules.clone(),
                })
            })
            .collect();
    }

    let scripts_dir = &ctx.layout.scripts;
    Ok(assets
        .iter()
        .filter(|(path, asset)| {
            matches!(asset.payload, AssetPayload::Script(ref m) if !m.vendored)
                && path.parent() == Some(scripts_dir.as_path())
        })
        .map(|(path, _)| Entry {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            modules: vec![path.clone()],
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::build::BuildMode;
    use crate::build::asset::{AssetReference, MimeClass, ScriptModule};
    use crate::config::ProjectConfig;

    pub(crate) fn script(path: &str, deps: &[&str], styles: &[&str], vendored: bool) -> (PathBuf, TransformedAsset) {
        let module = ScriptModule {
            code: format!("/* {path} */"),
            script_deps: deps.iter().map(PathBuf::from).collect(),
            style_deps: styles.iter().map(PathBuf::from).collect(),
            vendored,
            diagnostics: Vec::new(),
        };
        let asset = TransformedAsset {
            reference: AssetReference::new(path.into(), None, module.code.as_bytes(), MimeClass::Script),
            payload: AssetPayload::Script(module),
        };
        (PathBuf::from(path), asset)
    }

    pub(crate) fn stylesheet(path: &str) -> (PathBuf, TransformedAsset) {
        let css = format!("/* {path} */");
        let asset = TransformedAsset {
            reference: AssetReference::new(path.into(), None, css.as_bytes(), MimeClass::Stylesheet),
            payload: AssetPayload::Stylesheet(css),
        };
        (PathBuf::from(path), asset)
    }

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_walk_dependencies_first() {
        let assets: BTreeMap<_, _> = [
            script("js/app.js", &["js/a.js", "js/b.js"], &["style/app.scss"], false),
            script("js/a.js", &["js/b.js"], &[], false),
            script("js/b.js", &[], &[], false),
            stylesheet("style/app.scss"),
        ]
        .into_iter()
        .collect();
        let graph = ModuleGraph::from_assets(&assets);

        assert_eq!(graph.len(), 4);
        assert_eq!(
            graph.walk(&paths(&["js/app.js"])),
            paths(&["js/b.js", "js/a.js", "style/app.scss", "js/app.js"])
        );
    }

    #[test]
    fn test_walk_survives_cycles_and_missing_modules() {
        let assets: BTreeMap<_, _> = [
            script("js/a.js", &["js/b.js", "js/gone.js"], &[], false),
            script("js/b.js", &["js/a.js"], &[], false),
        ]
        .into_iter()
        .collect();
        let graph = ModuleGraph::from_assets(&assets);

        assert_eq!(graph.walk(&paths(&["js/a.js"])), paths(&["js/b.js", "js/a.js"]));
    }

    #[test]
    fn test_default_entries_are_top_level_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(&ProjectConfig::default(), dir.path(), BuildMode::Development);
        let assets: BTreeMap<_, _> = [
            script("js/index.js", &[], &[], false),
            script("js/script.js", &[], &[], false),
            script("js/lib/util.js", &[], &[], false),
            script("js/vendor.js", &[], &[], true),
        ]
        .into_iter()
        .collect();

        let entries = resolve_entries(&[], &assets, &ctx).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["index", "script"]);
    }

    #[test]
    fn test_configured_entry_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(&ProjectConfig::default(), dir.path(), BuildMode::Production);
        let configured = vec![EntryConfig {
            name: "main".into(),
            modules: vec![PathBuf::from("js/missing.js")],
        }];

        let err = resolve_entries(&configured, &BTreeMap::new(), &ctx).unwrap_err();
        assert!(matches!(err, BundleError::UnknownEntryModule { ref entry, .. } if entry == "main"));
    }
}
