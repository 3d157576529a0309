//! Hot reload of the configuration file.
//!
//! Editors often write a file several times in a row, so a reload is only
//! sent when the file content actually changed and still validates.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::ProxyConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one config file and emits each new valid `ProxyConfig`.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end the server listens on.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, updates } = self;
        let last_content = Mutex::new(std::fs::read_to_string(&path).ok());
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if triggers_reload(&event.kind) => {
                    let content = match std::fs::read_to_string(&watched) {
                        Ok(content) => content,
                        Err(e) => {
                            tracing::warn!(path = ?watched, error = %e, "Config file unreadable, skipping reload");
                            return;
                        }
                    };

                    let mut last = last_content.lock().expect("config watcher mutex poisoned");
                    if last.as_deref() == Some(content.as_str()) {
                        return;
                    }

                    match parse_config(&content) {
                        Ok(config) => {
                            tracing::info!(path = ?watched, "Config file changed, reloading");
                            *last = Some(content);
                            let _ = updates.send(config);
                        }
                        Err(e) => {
                            tracing::error!(path = ?watched, error = %e, "Invalid config, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

fn triggers_reload(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}
