//! Passthrough data files, copied byte-for-byte.

use std::path::{Path, PathBuf};

use crate::build::asset::{AssetPayload, AssetReference, MimeClass, TransformedAsset};
use crate::build::context::BuildContext;
use crate::build::source::SourceFile;

use super::{RuleError, TransformRule, is_under};

pub struct DataRule {
    dirs: Vec<PathBuf>,
}

impl DataRule {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl TransformRule for DataRule {
    fn name(&self) -> &'static str {
        "data"
    }

    fn matches(&self, path: &Path) -> bool {
        self.dirs.iter().any(|dir| is_under(path, dir))
    }

    fn transform(
        &self,
        file: &SourceFile,
        bytes: Vec<u8>,
        _ctx: &BuildContext,
    ) -> Result<Option<TransformedAsset>, RuleError> {
        let reference = AssetReference::new(
            file.relative.clone(),
            Some(file.relative.clone()),
            &bytes,
            MimeClass::Data,
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

    #[test]
    fn test_matches_configured_dirs() {
        let rule = DataRule::new(vec![PathBuf::from("json"), PathBuf::from("fonts")]);
        assert!(rule.matches(Path::new("json/main.json")));
        assert!(rule.matches(Path::new("fonts/a/b.woff2")));
        assert!(!rule.matches(Path::new("jsonx/main.json")));
    }
}
