use std::path::Path;

use crate::{
    InitArgs,
    config::{DEFAULT_CONFIG_FILE, ProjectConfig},
};

/// Directories of the default source layout.
fn layout_dirs(config: &ProjectConfig) -> Vec<std::path::PathBuf> {
    let layout = &config.layout;
    let mut dirs = vec![
        layout.pages.clone(),
        layout.scripts.clone(),
        layout.styles.clone(),
        layout.icons.clone(),
        layout.svg.clone(),
    ];
    dirs.extend(layout.data.iter().cloned());
    dirs.into_iter().map(|d| config.source.join(d)).collect()
}

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = if args.path.is_relative() {
        std::env::current_dir()?.join(&args.path)
    } else {
        args.path.clone()
    };

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            println!("Created directory {path}", path = path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    let config_file = path.join(DEFAULT_CONFIG_FILE);
    if config_file.exists() {
        return Err(anyhow::anyhow!(
            "Config file already exists: {}",
            config_file.display()
        ));
    }

    println!("Initializing project in {}", path.display());

    let default_config = ProjectConfig::default();
    let config_text = serde_yaml::to_string(&default_config)?;
    tokio::fs::write(&config_file, config_text).await?;
    println!("Created config file {}", config_file.display());

    for dir in layout_dirs(&default_config) {
        tokio::fs::create_dir_all(path.join(&dir)).await?;
    }
    write_if_missing(
        &path.join(&default_config.source).join(&default_config.layout.templates).join("layout.html"),
        STARTER_LAYOUT,
    )
    .await?;
    write_if_missing(
        &path.join(&default_config.source).join(&default_config.layout.pages).join("index.html"),
        STARTER_PAGE,
    )
    .await?;
    println!("Created source tree in {}", path.join(&default_config.source).display());

    Ok(())
}

async fn write_if_missing(path: &Path, content: &str) -> Result<(), anyhow::Error> {
    if !path.exists() {
        tokio::fs::write(path, content).await?;
    }
    Ok(())
}

const STARTER_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{% block title %}{% endblock %}</title>
</head>
<body>
{% block body %}{% endblock %}
</body>
</html>
"#;

const STARTER_PAGE: &str = r#"{% extends "layout.html" %}
{% block title %}Home{% endblock %}
{% block body %}<h1>{{ page.name }}</h1>{% endblock %}
"#;
