//! File watching for automatic rebuilds.
//!
//! Uses `notify-debouncer-full` to watch the source root and the config
//! file. Every relevant batch of changes bumps the build [`Generation`], so
//! a rebuild still running when the batch arrives gives up before swapping
//! in its output.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{
    Config as NotifyConfig, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer, new_debouncer_opt,
};

use super::emit::Generation;
use crate::config::WatchConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

// =============================================================================
// Watch events
// =============================================================================

/// What kind of change was detected in the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// The config file changed; reload it before rebuilding.
    Config,
    /// A template or page changed.
    Template { path: PathBuf },
    /// Any other file under the source root.
    Asset { path: PathBuf, deleted: bool },
}

impl ChangeKind {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ChangeKind::Config => None,
            ChangeKind::Template { path } | ChangeKind::Asset { path, .. } => Some(path),
        }
    }
}

/// Events sent from the file watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// Files changed, rebuild needed.
    FilesChanged(Vec<ChangeKind>),
    /// Watcher error occurred.
    Error(String),
}

// =============================================================================
// Path classification
// =============================================================================

/// Paths to watch for changes.
pub struct WatchPaths {
    pub source_root: PathBuf,
    pub config_path: PathBuf,
}

/// Classifies file paths into change types.
#[derive(Clone)]
pub struct PathClassifier {
    source_root: PathBuf,
    templates_dir: PathBuf,
    output_root: PathBuf,
    config_path: PathBuf,
}

impl PathClassifier {
    pub fn new(source_root: PathBuf, templates_dir: PathBuf, output_root: PathBuf, config_path: PathBuf) -> Self {
        Self {
            source_root,
            templates_dir,
            output_root,
            config_path,
        }
    }

    /// Classify a changed path into a ChangeKind.
    pub fn classify(&self, path: &Path, deleted: bool) -> Option<ChangeKind> {
        if path == self.config_path {
            return Some(ChangeKind::Config);
        }

        // Our own output (including staging directories) never triggers a build
        if path.starts_with(&self.output_root) {
            return None;
        }

        let relative = path.strip_prefix(&self.source_root).ok()?;
        let hidden = relative.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        if hidden {
            return None;
        }

        if path.starts_with(&self.templates_dir) {
            return Some(ChangeKind::Template {
                path: path.to_path_buf(),
            });
        }
        Some(ChangeKind::Asset {
            path: path.to_path_buf(),
            deleted,
        })
    }
}

// =============================================================================
// File watcher
// =============================================================================

/// A file watcher that can use either native or polling backend.
pub enum FileWatcher {
    /// Native file system watcher (recommended for local development).
    Native {
        _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
    /// Polling-based watcher (for network filesystems, Docker, etc.).
    Polling {
        _debouncer: Debouncer<PollWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
}

impl FileWatcher {
    /// Create a new file watcher that bumps `generation` on every change.
    pub fn new(
        config: &WatchConfig,
        paths: &WatchPaths,
        classifier: PathClassifier,
        generation: Generation,
    ) -> Result<Self, WatchError> {
        let debounce_timeout = Duration::from_millis(config.debounce_ms);

        let (tx, rx) = mpsc::channel();

        let callback = move |result: DebounceEventResult| match result {
            Ok(events) => {
                let changes = classify_events(&classifier, events.iter().map(|e| &e.event));
                if !changes.is_empty() {
                    generation.bump();
                    let _ = tx.send(WatchEvent::FilesChanged(changes));
                }
            }
            Err(errors) => {
                for e in errors {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            }
        };

        if config.poll {
            let poll_interval = Duration::from_millis(config.poll_interval_ms);
            let notify_config = NotifyConfig::default().with_poll_interval(poll_interval);

            let mut debouncer = new_debouncer_opt::<_, PollWatcher, RecommendedCache>(
                debounce_timeout,
                None,
                callback,
                RecommendedCache::default(),
                notify_config,
            )?;
            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Polling {
                _debouncer: debouncer,
                rx,
            })
        } else {
            let mut debouncer = new_debouncer(debounce_timeout, None, callback)?;
            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Native {
                _debouncer: debouncer,
                rx,
            })
        }
    }

    /// Receive the next watch event (blocking).
    pub fn recv(&self) -> Option<WatchEvent> {
        self.receiver().recv().ok()
    }

    /// Block for the next batch of changes, then fold in every batch that
    /// is already queued behind it.
    ///
    /// Returns `None` once the watcher is gone.
    pub fn next_changes(&self) -> Option<Vec<ChangeKind>> {
        loop {
            let mut changes = match self.recv()? {
                WatchEvent::FilesChanged(changes) => changes,
                WatchEvent::Error(e) => {
                    tracing::warn!("watch error: {e}");
                    continue;
                }
            };
            while let Ok(event) = self.receiver().try_recv() {
                match event {
                    WatchEvent::FilesChanged(more) => changes.extend(more),
                    WatchEvent::Error(e) => tracing::warn!("watch error: {e}"),
                }
            }
            return Some(coalesce(changes));
        }
    }

    fn receiver(&self) -> &Receiver<WatchEvent> {
        match self {
            FileWatcher::Native { rx, .. } => rx,
            FileWatcher::Polling { rx, .. } => rx,
        }
    }
}

fn classify_events<'a>(
    classifier: &PathClassifier,
    events: impl Iterator<Item = &'a notify::Event>,
) -> Vec<ChangeKind> {
    events
        .filter(|event| is_relevant_event(&event.kind))
        .filter_map(|event| {
            let deleted = matches!(event.kind, EventKind::Remove(_));
            event
                .paths
                .first()
                .and_then(|p| classifier.classify(p, deleted))
        })
        .collect()
}

/// Drop repeated changes, keeping first-seen order.
pub fn coalesce(changes: Vec<ChangeKind>) -> Vec<ChangeKind> {
    let mut out: Vec<ChangeKind> = Vec::with_capacity(changes.len());
    for change in changes {
        if !out.contains(&change) {
            out.push(change);
        }
    }
    out
}

/// Add watch paths to a debouncer.
fn add_watch_paths_to_debouncer<W: Watcher, C: notify_debouncer_full::FileIdCache>(
    debouncer: &mut Debouncer<W, C>,
    paths: &WatchPaths,
) -> Result<(), WatchError> {
    if paths.source_root.exists() {
        debouncer.watch(&paths.source_root, RecursiveMode::Recursive)?;
    }

    // Watch the config file's parent directory (to catch editors that
    // replace the file instead of writing it)
    if let Some(parent) = paths.config_path.parent()
        && parent.exists()
    {
        debouncer.watch(parent, RecursiveMode::NonRecursive)?;
    }

    Ok(())
}

/// Check if an event kind is relevant for rebuilds.
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    )
}
