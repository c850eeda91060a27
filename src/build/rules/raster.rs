//! Raster images and loose vectors, passed through unchanged.
//!
//! Production re-encoding happens later in the optimize stage, once every
//! image is known.

use std::path::Path;

use crate::build::asset::{
    AssetPayload, AssetReference, MimeClass, RASTER_EXTENSIONS, TransformedAsset,
};
use crate::build::context::BuildContext;
use crate::build::source::SourceFile;

use super::{RuleError, TransformRule, has_extension};

pub struct ImageRule;

impl TransformRule for ImageRule {
    fn name(&self) -> &'static str {
        "image"
    }

    fn matches(&self, path: &Path) -> bool {
        has_extension(path, RASTER_EXTENSIONS) || has_extension(path, &["svg"])
    }

    fn transform(
        &self,
        file: &SourceFile,
        bytes: Vec<u8>,
        _ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        let mime_class = if has_extension(&file.relative, &["svg"]) {
            MimeClass::Vector
        } else {
            MimeClass::Image
        };
        let reference = AssetReference::new(
            file.relative.clone(),
            Some(file.relative.clone()),
            &bytes,
            mime_class,
        );
        Ok(Some(TransformedAsset {
            reference,
            payload: AssetPayload::File(bytes),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildMode;
    use crate::config::ProjectConfig;
    use std::path::PathBuf;

    #[test]
    fn test_passthrough_mirrors_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(&ProjectConfig::default(), dir.path(), BuildMode::Production);
        let file = SourceFile {
            relative: PathBuf::from("img/photos/cat.jpg"),
            absolute: dir.path().join("src/img/photos/cat.jpg"),
        };

        let asset = ImageRule.transform(&file, vec![1, 2, 3], &ctx).unwrap().unwrap();
        assert_eq!(asset.reference.output_path, Some(PathBuf::from("img/photos/cat.jpg")));
        assert_eq!(asset.reference.mime_class, MimeClass::Image);
        assert!(matches!(asset.payload, AssetPayload::File(ref b) if b == &[1, 2, 3]));
    }

    #[test]
    fn test_matches() {
        assert!(ImageRule.matches(Path::new("img/a.PNG")));
        assert!(ImageRule.matches(Path::new("img/favicon.ico")));
        assert!(ImageRule.matches(Path::new("img/bg.svg")));
        assert!(!ImageRule.matches(Path::new("img/readme.txt")));
    }
}
