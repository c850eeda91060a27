//! Configuration loading and types for assetline.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Loading configs from files and the environment (`load`)

mod load;
mod types;

// Re-export the types other modules name
pub use types::{
    CssConfig, EntryConfig, HtmlConfig, ImageConfig, LayoutConfig, LintConfig, ProjectConfig,
    WatchConfig,
};

/// Default config file name, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "assetline.yaml";

/// Prefix of environment variables that override config values.
pub const ENV_PREFIX: &str = "ASSETLINE";

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

impl ProjectConfig {
    /// Check cross-field constraints serde can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.layout.template_extension;
        if ext.is_empty() || ext.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "layout.template_extension must be a bare extension like \"html\", got {ext:?}"
            )));
        }

        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.entries {
            if entry.name.is_empty() {
                return Err(ConfigError::Validation("entry names must not be empty".into()));
            }
            if matches!(entry.name.as_str(), "vendors" | "common") {
                return Err(ConfigError::Validation(format!(
                    "entry name '{}' is reserved for shared chunks",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "entry '{}' is defined more than once",
                    entry.name
                )));
            }
            if entry.modules.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "entry '{}' has no modules",
                    entry.name
                )));
            }
        }

        if self.images.png_optimization_level > 7 {
            return Err(ConfigError::Validation(
                "images.png_optimization_level must be between 0 and 7".into(),
            ));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be between 1 and 100".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProjectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_reserved_entry_name_rejected() {
        let mut config = ProjectConfig::default();
        config.entries.push(EntryConfig {
            name: "common".into(),
            modules: vec![PathBuf::from("js/index.js")],
        });
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut config = ProjectConfig::default();
        for _ in 0..2 {
            config.entries.push(EntryConfig {
                name: "index".into(),
                modules: vec![PathBuf::from("js/index.js")],
            });
        }
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("more than once"));
    }

    #[test]
    fn test_dotted_extension_rejected() {
        let mut config = ProjectConfig::default();
        config.layout.template_extension = ".pug".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
source: ./site
layout:
  template_extension: pug
entries:
  - name: index
    modules: [js/index.js, style/main.scss]
dev:
  port: 8080
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source, PathBuf::from("./site"));
        assert_eq!(config.output, PathBuf::from("dist"));
        assert_eq!(config.layout.template_extension, "pug");
        assert_eq!(config.layout.scripts, PathBuf::from("js"));
        assert_eq!(config.entries[0].modules.len(), 2);
        assert_eq!(config.dev.port, 8080);
        assert!(config.dev.live_reload);
        assert_eq!(config.lint.fatal_in_production, vec!["no-console", "no-debugger"]);
    }

    #[test]
    fn test_mode_accepts_any_flag() {
        use crate::build::BuildMode;

        let config: ProjectConfig = serde_yaml::from_str("mode: dev\n").unwrap();
        assert_eq!(config.mode, Some(BuildMode::Development));
        let config: ProjectConfig = serde_yaml::from_str("mode: staging\n").unwrap();
        assert_eq!(config.mode, Some(BuildMode::Production));
        assert_eq!(serde_yaml::to_string(&BuildMode::Development).unwrap().trim(), "development");
    }
}
