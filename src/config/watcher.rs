//! Configuration file watcher for hot reload.
//!
//! Only repository definitions are applied live; listener, storage and
//! routing limits take effect on restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!("Config file change detected, reloading...");
                    match load_config(&path) {
                        Ok(new_config) => {
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
