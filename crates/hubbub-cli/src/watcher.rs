//! Configuration file watcher for hot-reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use tracing::{info, warn};

use hubbub_config::FileSource;
use hubbub_core::{BotRegistry, PluginRegistry, reload_all};
use hubbub_web::ServingTable;

/// Start watching the config file for changes.
/// Returns a JoinHandle that can be used to abort the watcher.
pub fn start_config_watcher(
    source: Arc<FileSource>,
    registry: Arc<BotRegistry>,
    plugins: Arc<PluginRegistry>,
    serving: Arc<ServingTable>,
) -> Option<tokio::task::JoinHandle<()>> {
    let config_path = source.path().to_path_buf();

    // Only watch if the config directory exists
    let watch_dir = match config_path.parent() {
        Some(dir) if dir.exists() => dir.to_path_buf(),
        Some(dir) => {
            info!(
                "Config directory {} does not exist yet, skipping watcher",
                dir.display()
            );
            return None;
        }
        None => return None,
    };

    let handle = tokio::task::spawn_blocking(move || {
        run_watcher(watch_dir, config_path, source, registry, plugins, serving);
    });

    Some(handle)
}

fn run_watcher(
    watch_dir: PathBuf,
    config_path: PathBuf,
    source: Arc<FileSource>,
    registry: Arc<BotRegistry>,
    plugins: Arc<PluginRegistry>,
    serving: Arc<ServingTable>,
) {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = match new_debouncer(Duration::from_secs(1), tx) {
        Ok(d) => d,
        Err(e) => {
            warn!("Failed to create file watcher: {e}");
            return;
        }
    };

    if let Err(e) = debouncer
        .watcher()
        .watch(&watch_dir, notify::RecursiveMode::NonRecursive)
    {
        warn!("Failed to watch config directory: {e}");
        return;
    }

    info!("Config watcher started: watching {}", watch_dir.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let config_changed = events.iter().any(|event| {
                    event.kind == DebouncedEventKind::Any && event.path == config_path
                });

                if config_changed {
                    info!("Config file changed, reloading...");
                    trigger_reload(&source, &registry, &plugins, &serving);
                }
            }
            Ok(Err(e)) => {
                warn!("Config watcher error: {e:?}");
            }
            Err(_) => {
                info!("Config watcher channel closed, stopping");
                break;
            }
        }
    }
}

fn trigger_reload(
    source: &Arc<FileSource>,
    registry: &Arc<BotRegistry>,
    plugins: &Arc<PluginRegistry>,
    serving: &Arc<ServingTable>,
) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let source = source.clone();
            let registry = registry.clone();
            let plugins = plugins.clone();
            let serving = serving.clone();
            handle.spawn(async move {
                reload_all(&registry, &plugins, source.as_ref(), serving.as_ref()).await;
                info!("Config reloaded successfully");
            });
        }
        Err(_) => {
            warn!("No tokio runtime available for config reload");
        }
    }
}
