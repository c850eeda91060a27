//! Output emission.
//!
//! Artifacts are collected in memory, written to a staging directory next
//! to the output root and swapped in as a whole. The previous output stays
//! in place until the new tree is complete, and nothing from it survives
//! the swap.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::paths::normalize;

#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    #[error("two artifacts map to the same output path: {}", .0.display())]
    OutputCollision(PathBuf),

    #[error("invalid output path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("build superseded by a newer change")]
    Superseded,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EmitError + '_ {
    move |source| EmitError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Counter bumped on every source change while watching.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark all builds started before now as stale.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A token for a build starting now.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            generation: self.clone(),
            snapshot: self.0.load(Ordering::SeqCst),
        }
    }
}

/// Lets a build notice that a newer change has made it stale.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: Generation,
    snapshot: u64,
}

impl CancelToken {
    /// A token that is never cancelled (one-shot builds).
    pub fn never() -> Self {
        Generation::new().token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.generation.0.load(Ordering::SeqCst) != self.snapshot
    }
}

// =============================================================================
// Emitter
// =============================================================================

/// Collects output artifacts and writes them in one swap.
#[derive(Debug, Default)]
pub struct OutputEmitter {
    artifacts: BTreeMap<PathBuf, Vec<u8>>,
}

/// What `emit` wrote.
#[derive(Debug, Clone)]
pub struct EmitSummary {
    pub output_root: PathBuf,
    pub files: usize,
    pub bytes: usize,
}

impl OutputEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact under an output-relative path.
    ///
    /// Registering the same path twice is a naming collision.
    pub fn add(&mut self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) -> Result<(), EmitError> {
        let path = path.as_ref();
        let normalized = normalize(path)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| EmitError::InvalidPath(path.to_path_buf()))?;
        if self.artifacts.contains_key(&normalized) {
            return Err(EmitError::OutputCollision(normalized));
        }
        self.artifacts.insert(normalized, bytes.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Write every artifact and replace `output_root` with the result.
    ///
    /// If `cancel` fires before the swap, the staging directory is
    /// discarded and the previous output is left untouched.
    pub fn emit(self, output_root: &Path, cancel: &CancelToken) -> Result<EmitSummary, EmitError> {
        let (staging, backup) = sibling_dirs(output_root)?;
        if let Some(parent) = output_root.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        remove_dir_if_exists(&staging)?;
        remove_dir_if_exists(&backup)?;

        std::fs::create_dir_all(&staging).map_err(io_error(&staging))?;
        let mut bytes = 0;
        for (relative, content) in &self.artifacts {
            let path = staging.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            std::fs::write(&path, content).map_err(io_error(&path))?;
            bytes += content.len();
        }

        if cancel.is_cancelled() {
            remove_dir_if_exists(&staging)?;
            return Err(EmitError::Superseded);
        }

        let had_previous = output_root.exists();
        if had_previous {
            std::fs::rename(output_root, &backup).map_err(io_error(output_root))?;
        }
        if let Err(source) = std::fs::rename(&staging, output_root) {
            if had_previous {
                restore_previous(&backup, output_root);
            }
            return Err(EmitError::Io {
                path: output_root.to_path_buf(),
                source,
            });
        }
        if had_previous && let Err(e) = std::fs::remove_dir_all(&backup) {
            tracing::warn!(path = %backup.display(), "failed to remove previous output: {e}");
        }

        tracing::debug!(files = self.artifacts.len(), bytes, "emitted output");
        Ok(EmitSummary {
            output_root: output_root.to_path_buf(),
            files: self.artifacts.len(),
            bytes,
        })
    }
}

/// `.NAME.staging` and `.NAME.old` next to the output root.
fn sibling_dirs(output_root: &Path) -> Result<(PathBuf, PathBuf), EmitError> {
    let name = output_root
        .file_name()
        .ok_or_else(|| EmitError::InvalidPath(output_root.to_path_buf()))?
        .to_string_lossy();
    Ok((
        output_root.with_file_name(format!(".{name}.staging")),
        output_root.with_file_name(format!(".{name}.old")),
    ))
}

/// Move the previous tree back after a failed swap.
fn restore_previous(backup: &Path, output_root: &Path) -> bool {
    match std::fs::rename(backup, output_root) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                backup = %backup.display(),
                output = %output_root.display(),
                "failed to restore previous output: {e}"
            );
            false
        }
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), EmitError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(io_error(path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collision_is_rejected() {
        let mut emitter = OutputEmitter::new();
        emitter.add("img/a.png", b"a".to_vec()).unwrap();
        let err = emitter.add("img/./a.png", b"b".to_vec()).unwrap_err();
        assert!(matches!(err, EmitError::OutputCollision(p) if p == Path::new("img/a.png")));
    }

    #[test]
    fn test_escaping_path_is_rejected() {
        let mut emitter = OutputEmitter::new();
        assert!(matches!(emitter.add("../evil.js", "x"), Err(EmitError::InvalidPath(_))));
        assert!(matches!(emitter.add("", "x"), Err(EmitError::InvalidPath(_))));
    }

    #[test]
    fn test_emit_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dist");
        fs::create_dir_all(output.join("old")).unwrap();
        fs::write(output.join("old/stale.js"), "stale").unwrap();

        let mut emitter = OutputEmitter::new();
        emitter.add("index.html", "<html></html>").unwrap();
        emitter.add("css/index.css", "body{}").unwrap();
        let summary = emitter.emit(&output, &CancelToken::never()).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(fs::read_to_string(output.join("index.html")).unwrap(), "<html></html>");
        assert!(output.join("css/index.css").exists());
        assert!(!output.join("old").exists());
        assert!(!dir.path().join(".dist.staging").exists());
        assert!(!dir.path().join(".dist.old").exists());
    }

    #[test]
    fn test_superseded_build_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dist");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("index.html"), "previous").unwrap();

        let generation = Generation::new();
        let token = generation.token();
        generation.bump();
        assert!(token.is_cancelled());

        let mut emitter = OutputEmitter::new();
        emitter.add("index.html", "next").unwrap();
        let err = emitter.emit(&output, &token).unwrap_err();

        assert!(matches!(err, EmitError::Superseded));
        assert_eq!(fs::read_to_string(output.join("index.html")).unwrap(), "previous");
        assert!(!dir.path().join(".dist.staging").exists());
    }

    #[test]
    fn test_restore_previous() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dist");
        let backup = dir.path().join(".dist.old");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("index.html"), "previous").unwrap();

        assert!(restore_previous(&backup, &output));
        assert_eq!(fs::read_to_string(output.join("index.html")).unwrap(), "previous");
        // nothing left to restore
        assert!(!restore_previous(&backup, &dir.path().join("other")));
    }

    #[test]
    fn test_emit_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("a/b/dist");

        let mut emitter = OutputEmitter::new();
        emitter.add("index.html", "x").unwrap();
        emitter.emit(&output, &CancelToken::never()).unwrap();
        assert!(output.join("index.html").exists());
    }
}
