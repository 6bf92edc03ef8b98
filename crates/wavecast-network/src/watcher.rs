//! Watching the mesh file and reading it on demand

use crate::hub::{HubEvent, HubSender, ReadRequest};
use bytes::Bytes;
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Failure to read the watched file
#[derive(Error, Debug)]
#[error("Failed to read {path}: {source}")]
pub struct FileReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failure to start watching
#[derive(Error, Debug)]
#[error("Failed to watch {dir}: {source}")]
pub struct WatchError {
    pub dir: PathBuf,
    #[source]
    pub source: notify_debouncer_mini::notify::Error,
}

/// Directory to watch for a file; the current directory for bare file names
pub fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether an event path refers to the watched file.
///
/// Editors often save by writing a temporary file and renaming it over the
/// original, so events are matched by file name within the watched directory.
pub fn is_watched_file(event_path: &Path, watched: &Path) -> bool {
    event_path == watched
        || (event_path.file_name().is_some() && event_path.file_name() == watched.file_name())
}

/// Keeps the debouncer alive; dropping it stops the watch
pub struct FileWatcher {
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl FileWatcher {
    /// Start watching `path`, sending one `FileChanged` per debounced burst
    pub fn spawn(path: &Path, debounce: Duration, hub: HubSender) -> Result<Self, WatchError> {
        let dir = watch_dir(path);
        let watched = path.to_path_buf();
        let target = watched.clone();

        let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
            Ok(events) => {
                if events.iter().any(|e| is_watched_file(&e.path, &target)) {
                    trace!("Debounced change to {:?}", target);
                    let _ = hub.send(HubEvent::FileChanged);
                }
            }
            Err(e) => warn!("File watch error: {:?}", e),
        })
        .map_err(|source| WatchError {
            dir: dir.clone(),
            source,
        })?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError {
                dir: dir.clone(),
                source,
            })?;

        info!("Watching {:?} (debounce {:?})", watched, debounce);

        Ok(Self {
            path: watched,
            _debouncer: debouncer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read the whole file into a payload
pub async fn read_mesh_file(path: &Path) -> Result<Bytes, FileReadError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| FileReadError {
            path: path.to_path_buf(),
            source,
        })
}

/// Single task through which every read of the watched file goes.
///
/// Requests are answered strictly in the order they arrive.
pub struct MeshFileReader {
    path: PathBuf,
    requests: mpsc::UnboundedReceiver<ReadRequest>,
    hub: HubSender,
}

impl MeshFileReader {
    pub fn new(
        path: impl Into<PathBuf>,
        requests: mpsc::UnboundedReceiver<ReadRequest>,
        hub: HubSender,
    ) -> Self {
        Self {
            path: path.into(),
            requests,
            hub,
        }
    }

    pub async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            let result = read_mesh_file(&self.path).await;
            match &result {
                Ok(bytes) => debug!("Read {} bytes from {:?}", bytes.len(), self.path),
                Err(e) => debug!("Read failed: {}", e),
            }

            let event = HubEvent::FileLoaded {
                target: request.target,
                result,
            };
            if self.hub.send(event).is_err() {
                debug!("Hub is gone, stopping file reader");
                break;
            }
        }
    }
}
