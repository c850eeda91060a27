use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod build;
mod commands;
mod config;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The command to execute
    #[command(subcommand)]
    command: AssetlineCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the project in
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,
}

#[derive(Parser)]
struct BuildArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config_file: Option<PathBuf>,

    /// Build mode: `development`, or anything else for production
    #[arg(short, long, env = "ASSETLINE_MODE")]
    mode: Option<String>,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// The port to bind to (defaults to `dev.port` from the config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Open the project in the default browser
    #[arg(short, long, default_value = "false")]
    open: bool,

    /// The path to the configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config_file: Option<PathBuf>,

    /// Whether to watch for changes and rebuild automatically
    #[arg(short, long, default_value = "true")]
    watch: bool,
}

#[derive(Parser)]
struct CleanArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config_file: Option<PathBuf>,

    /// Only print what would be deleted
    #[arg(short, long, default_value = "false")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum AssetlineCommand {
    /// Initialize a new assetline project
    Init(InitArgs),

    /// Build the project into the output directory
    Build(BuildArgs),

    /// Build in development mode and serve the output with live reload
    Serve(ServeArgs),

    /// Delete the output directory
    Clean(CleanArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ASSETLINE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    match args.command {
        AssetlineCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        AssetlineCommand::Build(args) => {
            commands::build::run(&args).await?;
        }
        AssetlineCommand::Serve(args) => {
            commands::serve::run(&args).await?;
        }
        AssetlineCommand::Clean(args) => {
            commands::clean::run(&args).await?;
        }
    }

    Ok(())
}
