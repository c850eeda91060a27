use crate::{CleanArgs, build::Builder, build::base_path_from_config, config::ProjectConfig};

pub async fn run(args: &CleanArgs) -> Result<(), anyhow::Error> {
    let config_path = ProjectConfig::resolve_path(args.config_file.as_deref())?;
    let config = ProjectConfig::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = base_path_from_config(&config_path);
    let output_root = Builder::new(config, base_path).context().output_root;

    let Some(name) = output_root.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Err(anyhow::anyhow!("invalid output directory {}", output_root.display()));
    };
    let parent = output_root.parent().unwrap_or(&output_root).to_path_buf();

    // The output root plus anything an interrupted build left next to it
    let targets = [
        output_root.clone(),
        parent.join(format!(".{name}.staging")),
        parent.join(format!(".{name}.old")),
    ];

    let mut found = false;
    for target in targets.iter().filter(|t| t.exists()) {
        found = true;
        if args.dry_run {
            println!("Would delete {}", target.display());
        } else {
            tokio::fs::remove_dir_all(target).await?;
            println!("Deleted {}", target.display());
        }
    }
    if !found {
        println!("Nothing to clean in {}", parent.display());
    }

    Ok(())
}
