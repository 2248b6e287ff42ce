//! Live reload of the project configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Events from the file watcher
#[derive(Debug)]
pub enum WatcherEvent {
    ConfigChanged(PathBuf),
    WatcherError(notify::Error),
}

/// Keeps the underlying watcher alive; dropping it stops watching.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Watch `path` for changes.
    ///
    /// The parent directory is watched rather than the file so that editors
    /// which save by replacing the file are still noticed.
    pub fn start(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatcherEvent>)> {
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) =
                        event.kind
                    {
                        for path in event.paths {
                            if path.file_name() == Some(file_name.as_os_str()) {
                                let _ = tx.send(WatcherEvent::ConfigChanged(path));
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatcherEvent::WatcherError(e));
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        log::debug!("Watching {} for config changes", directory.display());

        Ok((
            Self {
                _watcher: watcher,
                path: path.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
