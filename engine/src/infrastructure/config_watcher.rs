//! Filesystem watcher for the config file
//!
//! Watches the parent directory (editors replace files by rename, which a
//! watch on the file itself would miss) and forwards events for the config
//! file name into a tokio channel.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Config path '{0}' has no file name")]
    NoFileName(String),

    #[error("Failed to watch '{path}': {source}")]
    Notify {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// Keeps the underlying watcher alive; dropping it stops the events
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Start watching `path`; one `()` is sent per relevant filesystem event
    pub fn start(path: &Path, changes: mpsc::UnboundedSender<()>) -> Result<Self, WatchError> {
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| WatchError::NoFileName(path.display().to_string()))?
            .to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let watched = file_name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_relevant(&event.kind) {
                        return;
                    }
                    if event.paths.iter().any(|p| p.file_name() == Some(watched.as_os_str())) {
                        debug!(kind = ?event.kind, "Config file changed");
                        let _ = changes.send(());
                    }
                }
                Err(e) => warn!(error = %e, "Config watcher error"),
            },
            Config::default(),
        )
        .map_err(|source| WatchError::Notify {
            path: dir.display().to_string(),
            source,
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                path: dir.display().to_string(),
                source,
            })?;

        info!(path = %path.display(), "Watching config file for changes");
        Ok(Self { _watcher: watcher })
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    )
}
