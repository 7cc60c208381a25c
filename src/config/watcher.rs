//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - Watches the parent directory so editors that save via rename are still seen
//! - A burst of change events collapses into one reload after a quiet period
//! - Invalid files are logged and skipped; the live policy stays in place
//! - A reload identical to the last published config is not sent again

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ResilienceConfig;

/// Publishes validated configuration whenever the file on disk changes.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<ResilienceConfig>,
}

impl ConfigWatcher {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ResilienceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            debounce: Self::DEFAULT_DEBOUNCE,
            update_tx,
        }, update_rx)
    }

    /// Quiet period that must follow the last change event before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| notify::Error::generic(&e.to_string()))?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let file_name = self.path.file_name().map(|name| name.to_os_string());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && signal_tx.send(()).is_err() {
                        tracing::debug!("Config reload task has stopped, ignoring change");
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let current = load_config(&self.path).ok();
        runtime.spawn(reload_loop(
            self.path.clone(),
            signal_rx,
            self.update_tx,
            self.debounce,
            current,
        ));

        tracing::info!(path = ?self.path, debounce = ?self.debounce, "Config watcher started");
        Ok(watcher)
    }
}

/// Reload `path` once per burst of `signals` and publish changed configs on `updates`.
///
/// Ends when the signal side closes or nobody listens for updates any more.
async fn reload_loop(
    path: PathBuf,
    mut signals: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<ResilienceConfig>,
    debounce: Duration,
    mut current: Option<ResilienceConfig>,
) {
    while signals.recv().await.is_some() {
        // wait until the burst goes quiet
        while let Ok(Some(())) = tokio::time::timeout(debounce, signals.recv()).await {}

        let config = match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to reload resilience config, keeping current policy");
                continue;
            }
        };

        if current.as_ref() == Some(&config) {
            tracing::debug!(path = ?path, "Config file touched without changes");
            continue;
        }

        tracing::info!(path = ?path, "Resilience config change detected, publishing");
        if let Err(e) = updates.send(config.clone()) {
            tracing::warn!(path = ?path, error = %e, "Config update receiver dropped, stopping watcher task");
            return;
        }
        current = Some(config);
    }

    tracing::debug!(path = ?path, "Config watcher closed");
}
