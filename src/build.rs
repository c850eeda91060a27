mod asset;
mod builder;
mod bundle;
mod context;
mod discover;
mod emit;
mod graph;
mod hash;
mod html;
mod lint;
mod optimize;
mod paths;
pub mod pipeline;
mod render;
pub mod rules;
mod runtime;
pub mod source;
mod sprite;
mod watch;

pub use builder::{BuildError, BuildResult, Builder};
pub use context::BuildMode;
pub use emit::Generation;
pub use html::LIVE_RELOAD_PATH;
pub use paths::base_path_from_config;
pub use watch::{ChangeKind, FileWatcher, PathClassifier, WatchPaths};
