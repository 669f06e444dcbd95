//! Change detector for the timing log
//!
//! Wraps a `notify` watcher on the log's parent directory. Watching the
//! directory instead of the file itself keeps the watch alive when timing
//! software replaces the log (write to a temp file, rename over it).
//!
//! Raw notifications for the log are mapped to:
//! - data writes -> `Modified`
//! - create, or a rename onto the log -> `Created`
//! - permission, ownership or timestamp changes -> `MetadataChanged`
//!
//! Notifications arriving within the debounce window are coalesced into one
//! signal; the strongest kind wins (`Created` > `Modified` >
//! `MetadataChanged`). A remove or a rename away is settled at the end of
//! the window: if the log exists again it was replaced (`Created`),
//! otherwise the watch fails with `PathRemoved`. Watcher errors are fatal
//! too. Signals go through an unbounded channel so the detector never waits
//! on the consumer.

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Kind of change observed on the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    MetadataChanged,
}

impl ChangeKind {
    fn rank(self) -> u8 {
        match self {
            ChangeKind::Created => 2,
            ChangeKind::Modified => 1,
            ChangeKind::MetadataChanged => 0,
        }
    }

    fn strongest(self, other: ChangeKind) -> ChangeKind {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// One logical "the file changed" notification
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
}

/// Change detector errors
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    /// The watched file disappeared after the watch started
    #[error("Watched file removed: {0}")]
    PathRemoved(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File watcher failed on {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// What one raw notification means for the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
    Changed(ChangeKind),
    /// Removed or renamed away; may be back by the end of the window
    Gone,
}

/// Map a raw notification to an observation on `target`, if it concerns it
fn classify(event: &Event, target: &Path) -> Option<Observation> {
    let touches_target = event.paths.iter().any(|p| p == target);

    match &event.kind {
        // Removing the log or any directory above it
        EventKind::Remove(_) => event
            .paths
            .iter()
            .any(|p| target.starts_with(p))
            .then_some(Observation::Gone),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to]) => {
                if to == target {
                    Some(Observation::Changed(ChangeKind::Created))
                } else if from == target {
                    Some(Observation::Gone)
                } else {
                    None
                }
            }
            (RenameMode::To, _) if touches_target => {
                Some(Observation::Changed(ChangeKind::Created))
            }
            // From, Any: existence is checked when the window closes
            _ if touches_target => Some(Observation::Gone),
            _ => None,
        },
        _ if !touches_target => None,
        EventKind::Create(_) => Some(Observation::Changed(ChangeKind::Created)),
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            Some(Observation::Changed(ChangeKind::MetadataChanged))
        }
        EventKind::Modify(_) | EventKind::Any => Some(Observation::Changed(ChangeKind::Modified)),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

/// Observations collected during one debounce window
#[derive(Debug, Default)]
struct Pending {
    kind: Option<ChangeKind>,
    gone: bool,
}

impl Pending {
    fn absorb(&mut self, observation: Observation) {
        match observation {
            Observation::Changed(kind) => {
                self.kind = Some(match self.kind {
                    Some(current) => current.strongest(kind),
                    None => kind,
                });
            }
            Observation::Gone => self.gone = true,
        }
    }

    fn is_empty(&self) -> bool {
        self.kind.is_none() && !self.gone
    }
}

/// Items delivered to the subscriber
pub type DetectorEvent = Result<ChangeSignal, DetectorError>;

/// A running detector
pub struct ChangeSubscription {
    pub signals: mpsc::UnboundedReceiver<DetectorEvent>,
    pub handle: JoinHandle<()>,
}

/// Notification-based change detector for one file
#[derive(Debug, Clone)]
pub struct FileChangeDetector {
    path: PathBuf,
    debounce: Duration,
}

impl FileChangeDetector {
    pub fn new(path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            path: path.into(),
            debounce,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> DetectorError {
        DetectorError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn watch_error(&self, source: notify::Error) -> DetectorError {
        DetectorError::Watch {
            path: self.path.clone(),
            source,
        }
    }

    /// Start watching until `cancel` fires or the file disappears
    ///
    /// Fails immediately if the path is missing, is not a regular file, or
    /// the watcher cannot be installed.
    pub async fn subscribe(
        self,
        cancel: CancellationToken,
    ) -> Result<ChangeSubscription, DetectorError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DetectorError::PathNotFound(self.path));
            }
            Err(source) => return Err(self.io_error(source)),
        };
        if !metadata.is_file() {
            return Err(DetectorError::NotAFile(self.path));
        }

        // Notifications carry resolved paths
        let target = tokio::fs::canonicalize(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        let directory = match target.parent() {
            Some(directory) => directory.to_path_buf(),
            None => return Err(DetectorError::NotAFile(self.path)),
        };

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the detector is shutting down
            let _ = raw_tx.send(res);
        })
        .map_err(|source| self.watch_error(source))?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|source| self.watch_error(source))?;

        debug!(path = %self.path.display(), directory = %directory.display(), "Watching timing log");

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.forward(target, watcher, raw_rx, tx, cancel));

        Ok(ChangeSubscription {
            signals: rx,
            handle,
        })
    }

    async fn forward(
        self,
        target: PathBuf,
        _watcher: RecommendedWatcher,
        mut raw: mpsc::UnboundedReceiver<notify::Result<Event>>,
        tx: mpsc::UnboundedSender<DetectorEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let mut pending = Pending::default();

            // Wait for the first notification that concerns the log
            while pending.is_empty() {
                let received = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(path = %self.path.display(), "Change detector cancelled");
                        return;
                    }
                    received = raw.recv() => received,
                };
                match received {
                    Some(Ok(event)) => {
                        if let Some(observation) = classify(&event, &target) {
                            pending.absorb(observation);
                        }
                    }
                    Some(Err(source)) => {
                        let _ = tx.send(Err(self.watch_error(source)));
                        return;
                    }
                    None => return,
                }
            }

            // Coalesce the burst
            let window = tokio::time::sleep(self.debounce);
            tokio::pin!(window);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(path = %self.path.display(), "Change detector cancelled");
                        return;
                    }
                    _ = &mut window => break,
                    received = raw.recv() => match received {
                        Some(Ok(event)) => {
                            if let Some(observation) = classify(&event, &target) {
                                pending.absorb(observation);
                            }
                        }
                        Some(Err(source)) => {
                            let _ = tx.send(Err(self.watch_error(source)));
                            return;
                        }
                        None => break,
                    },
                }
            }

            let kind = if pending.gone {
                match tokio::fs::metadata(&target).await {
                    Ok(_) => ChangeKind::Created,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!(path = %self.path.display(), "Watched file removed");
                        let _ = tx.send(Err(DetectorError::PathRemoved(self.path.clone())));
                        return;
                    }
                    Err(source) => {
                        let _ = tx.send(Err(self.io_error(source)));
                        return;
                    }
                }
            } else {
                match pending.kind {
                    Some(kind) => kind,
                    None => continue,
                }
            };

            debug!(path = %self.path.display(), ?kind, "File change detected");
            let signal = ChangeSignal {
                path: self.path.clone(),
                kind,
                observed_at: Utc::now(),
            };
            if tx.send(Ok(signal)).is_err() {
                // Subscriber dropped
                return;
            }
        }
    }
}
