use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

use crate::{
    ServeArgs,
    build::{
        BuildMode, BuildResult, Builder, ChangeKind, FileWatcher, Generation, LIVE_RELOAD_PATH,
        PathClassifier, WatchPaths, base_path_from_config,
    },
    config::ProjectConfig,
};

/// SSE handler for live reload notifications.
async fn live_reload_handler(
    State(tx): State<broadcast::Sender<()>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = tx.subscribe();
    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(_) => {
                    yield Ok(Event::default().event("reload").data("reload"));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some messages, but that's fine - we just need the latest
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn run(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let config_path = ProjectConfig::resolve_path(args.config_file.as_deref())?;
    let config = ProjectConfig::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = base_path_from_config(&config_path);
    let context = Builder::new(config.clone(), base_path.clone()).context();
    let port = args.port.unwrap_or(context.port);

    // Create broadcast channel for live reload
    let (reload_tx, _) = broadcast::channel::<()>(16);
    let generation = Generation::new();

    println!("Building site...");
    let initial = config.clone();
    let initial_base = base_path.clone();
    let initial_token = generation.clone();
    let result = tokio::task::spawn_blocking(move || do_build(&initial, &initial_base, &initial_token)).await??;
    print_result(&result);

    // Set up file watcher if enabled
    let _watcher_handle = if args.watch {
        let source_root = canonical(&context.source_root);
        let watched_config = canonical(&config_path);
        let watch_paths = WatchPaths {
            source_root: source_root.clone(),
            config_path: watched_config.clone(),
        };
        let classifier = PathClassifier::new(
            source_root.clone(),
            source_root.join(&context.layout.templates),
            canonical(&context.output_root),
            watched_config,
        );

        match FileWatcher::new(&config.dev.watch, &watch_paths, classifier, generation.clone()) {
            Ok(watcher) => {
                println!("Watching for changes...");

                let mut rebuild_config = config.clone();
                let rebuild_base = base_path.clone();
                let rebuild_config_path = config_path.clone();
                let rebuild_generation = generation.clone();
                let watcher_reload_tx = reload_tx.clone();

                // One blocking worker, so at most one rebuild is in flight;
                // changes arriving meanwhile are folded into the next one.
                Some(tokio::task::spawn_blocking(move || {
                    while let Some(changes) = watcher.next_changes() {
                        println!("\nDetected {} change(s), rebuilding...", changes.len());
                        for change in &changes {
                            if let Some(path) = change.path() {
                                tracing::debug!(path = %path.display(), "changed");
                            }
                        }

                        if changes.contains(&ChangeKind::Config) {
                            match ProjectConfig::load_from_file(&rebuild_config_path) {
                                Ok(config) => rebuild_config = config,
                                Err(e) => {
                                    eprintln!("Config error: {}", e);
                                    continue;
                                }
                            }
                        }

                        match do_build(&rebuild_config, &rebuild_base, &rebuild_generation) {
                            Ok(result) => {
                                print_result(&result);
                                // Notify connected browsers to reload
                                let _ = watcher_reload_tx.send(());
                            }
                            Err(e) if e.is_superseded() => {
                                tracing::debug!("build superseded by newer changes");
                            }
                            Err(e) => eprintln!("Build error: {}", e),
                        }
                    }
                }))
            }
            Err(e) => {
                eprintln!("Warning: Failed to start file watcher: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Create the static file server
    let serve_dir = ServeDir::new(&result.output_dir).append_index_html_on_directories(true);

    // Build router with SSE endpoint for live reload
    let app = Router::new()
        .route(LIVE_RELOAD_PATH, get(live_reload_handler))
        .with_state(reload_tx)
        .fallback_service(serve_dir);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", args.bind, port).parse()?;

    // Determine the URL to display
    let display_host = if args.bind == "0.0.0.0" {
        "localhost"
    } else {
        &args.bind
    };
    let url = format!("http://{}:{}", display_host, port);

    println!("\nServing site at {}", url);
    println!("Press Ctrl+C to stop\n");

    // Open browser if requested
    if args.open
        && let Err(e) = open::that(&url)
    {
        eprintln!("Failed to open browser: {}", e);
    }

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run a development build that the next batch of changes can cancel.
fn do_build(
    config: &ProjectConfig,
    base_path: &Path,
    generation: &Generation,
) -> Result<BuildResult, crate::build::BuildError> {
    Builder::new(config.clone(), base_path.to_path_buf())
        .with_mode(BuildMode::Development)
        .with_live_reload(config.dev.live_reload)
        .with_cancel_token(generation.token())
        .build()
}

fn print_result(result: &BuildResult) {
    println!(
        "Built {} pages, {} chunks, {} files",
        result.stats.pages, result.stats.chunks, result.stats.files
    );
    for error in &result.reported {
        eprintln!("  skipped: {}", error);
    }
}

/// Canonicalize the path to ensure consistent matching with file events.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
