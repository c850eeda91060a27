//! Configuration loading from files.
//!
//! The YAML file is layered under `ASSETLINE_*` environment variables
//! (`ASSETLINE_MODE=development`, `ASSETLINE_DEV__PORT=8080`, ...).

use std::path::{Path, PathBuf};

use super::{ConfigError, DEFAULT_CONFIG_FILE, ENV_PREFIX, ProjectConfig};

impl ProjectConfig {
    /// Absolute path of the config file named on the command line,
    /// defaulting to `assetline.yaml` in the working directory.
    pub fn resolve_path(config_file: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        if config_file.is_relative() {
            Ok(std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file))
        } else {
            Ok(config_file.to_path_buf())
        }
    }

    /// Load the config from a file path.
    ///
    /// A missing file is not an error: every setting has a default.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ProjectConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load_from_file(&dir.path().join("assetline.yaml")).unwrap();
        assert_eq!(config.source, PathBuf::from("src"));
        assert_eq!(config.sprite.output, PathBuf::from("img/sprite.svg"));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetline.yaml");
        std::fs::write(
            &path,
            "output: public\nimages:\n  jpeg_quality: 70\nsprite:\n  symbol_prefix: icon-\n",
        )
        .unwrap();

        let config = ProjectConfig::load_from_file(&path).unwrap();
        assert_eq!(config.output, PathBuf::from("public"));
        assert_eq!(config.images.jpeg_quality, 70);
        assert_eq!(config.sprite.symbol_prefix, "icon-");
    }

    #[test]
    fn test_resolve_path_keeps_absolute() {
        let path = ProjectConfig::resolve_path(Some(Path::new("/srv/site/assetline.yaml"))).unwrap();
        assert_eq!(path, PathBuf::from("/srv/site/assetline.yaml"));
        let default = ProjectConfig::resolve_path(None).unwrap();
        assert!(default.is_absolute());
        assert!(default.ends_with(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetline.yaml");
        std::fs::write(&path, "images:\n  png_optimization_level: 9\n").unwrap();

        let err = ProjectConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
