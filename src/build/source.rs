use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::context::BuildContext;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("source path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("source path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read directory entry in {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        source: std::io::Error,
    },
}

// =============================================================================
// Source files
// =============================================================================

/// A file discovered in one of the asset directories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path relative to the source root
    pub relative: PathBuf,
    /// Absolute path
    pub absolute: PathBuf,
}

/// The source root and its asset directories.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    asset_dirs: Vec<PathBuf>,
}

impl SourceTree {
    /// Validate the source root and the directories the pipeline requires.
    ///
    /// Missing asset directories are fine (a site without scripts is
    /// allowed); a missing root, pages or templates directory is not.
    pub fn resolve(ctx: &BuildContext) -> Result<Self, SourceError> {
        let root = ctx.source_root.clone();
        for required in [root.clone(), ctx.templates_dir(), ctx.pages_dir()] {
            if !required.exists() {
                return Err(SourceError::PathNotFound(required));
            }
            if !required.is_dir() {
                return Err(SourceError::NotADirectory(required));
            }
        }

        let layout = &ctx.layout;
        let mut asset_dirs = vec![
            layout.scripts.clone(),
            layout.styles.clone(),
            layout.images.clone(),
            layout.icons.clone(),
            layout.svg.clone(),
            layout.vendor.clone(),
        ];
        asset_dirs.extend(layout.data.iter().cloned());

        Ok(Self { root, asset_dirs })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover every file under the asset directories.
    ///
    /// Directories nested in each other (icons inside images, vendor inside
    /// scripts) are only listed once. The result is sorted.
    pub fn discover_assets(&self) -> Result<Vec<SourceFile>, SourceError> {
        let mut relatives = BTreeSet::new();
        for dir in &self.asset_dirs {
            let absolute = self.root.join(dir);
            if absolute.is_dir() {
                self.walk_directory(&absolute, dir, &mut relatives)?;
            }
        }

        Ok(relatives
            .into_iter()
            .map(|relative| SourceFile {
                absolute: self.root.join(&relative),
                relative,
            })
            .collect())
    }

    /// Recursively walk a directory and collect source-relative file paths.
    fn walk_directory(
        &self,
        dir: &Path,
        relative_path: &Path,
        items: &mut BTreeSet<PathBuf>,
    ) -> Result<(), SourceError> {
        let entries = std::fs::read_dir(dir).map_err(|e| SourceError::ReadDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| SourceError::ReadEntry {
                path: dir.to_path_buf(),
                source: e,
            })?;

            let path = entry.path();
            let file_name = entry.file_name();
            let file_name_str = file_name.to_string_lossy();

            // Skip hidden files and directories
            if file_name_str.starts_with('.') {
                continue;
            }

            let item_relative_path = relative_path.join(&file_name);

            if path.is_dir() {
                self.walk_directory(&path, &item_relative_path, items)?;
            } else if path.is_file() {
                items.insert(item_relative_path);
            }
        }

        Ok(())
    }
}
