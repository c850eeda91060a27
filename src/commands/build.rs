use crate::{
    BuildArgs,
    build::{BuildMode, Builder, base_path_from_config},
    config::ProjectConfig,
};

pub async fn run(args: &BuildArgs) -> Result<(), anyhow::Error> {
    let config_path = ProjectConfig::resolve_path(args.config_file.as_deref())?;
    let config = ProjectConfig::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = base_path_from_config(&config_path);

    let mut builder = Builder::new(config, base_path);
    if let Some(mode) = &args.mode {
        builder = builder.with_mode(BuildMode::from_flag(mode));
    }

    // The pipeline is CPU-bound and synchronous
    let result = tokio::task::spawn_blocking(move || builder.build()).await??;

    println!(
        "Built {} site to {} ({} pages, {} chunks, {} files, {} icons)",
        result.mode,
        result.output_dir.display(),
        result.stats.pages,
        result.stats.chunks,
        result.stats.files,
        result.stats.symbols
    );
    if result.lint_warnings > 0 {
        println!("{} lint warning(s)", result.lint_warnings);
    }

    if !result.reported.is_empty() {
        return Err(anyhow::anyhow!(
            "build finished with {} error(s):\n{}",
            result.reported.len(),
            result.reported.join("\n")
        ));
    }

    Ok(())
}
