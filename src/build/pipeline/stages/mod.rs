//! Default pipeline stages.
//!
//! 1. **AssetsStage** - Transform source files through the rule set
//! 2. **LintStage** - Report script diagnostics
//! 3. **BundleStage** - Build the module graph and split chunks
//! 4. **OptimizeStage** - Minify chunks, re-encode images (production)
//! 5. **FingerprintStage** - Assign chunk file names
//! 6. **PagesStage** - Render and post-process pages
//! 7. **SpriteStage** / **SpriteRefsStage** - Build and check the sprite sheet
//! 8. **EmitStage** - Write the output directory

mod assets;
mod bundle;
mod emit;
mod fingerprint;
mod lint;
mod optimize;
mod pages;
mod sprite;

pub use assets::AssetsStage;
pub use bundle::BundleStage;
pub use emit::EmitStage;
pub use fingerprint::FingerprintStage;
pub use lint::LintStage;
pub use optimize::OptimizeStage;
pub use pages::PagesStage;
pub use sprite::{SpriteRefsStage, SpriteStage};
