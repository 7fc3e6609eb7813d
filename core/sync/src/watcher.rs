//! Filesystem watcher capability and its `notify` backed implementation.
//!
//! The daemon only needs two things from a watcher: start delivering
//! events for a directory tree into a [`ChangeSink`], and stop doing so.
//! [`ChangeSource`] captures exactly that, so the daemon can be driven by a
//! test double as easily as by the OS.

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use quietsync_common::{Error, Result, WatchTarget};

use crate::sink::{ChangeEvent, ChangeSink};

/// Stream of unrecoverable watcher faults.
///
/// The channel closing while the watcher is supposed to be running is itself
/// a fault: event delivery has ended.
pub type FaultReceiver = mpsc::UnboundedReceiver<Error>;

/// Something that reports changes under a directory tree.
pub trait ChangeSource: Send {
    /// Begin watching `target` recursively, recording every change in `sink`.
    ///
    /// # Errors
    /// - The source is already running
    /// - The OS refused the subscription (missing path, watch limits, ...)
    fn start(&mut self, target: &WatchTarget, sink: Arc<ChangeSink>) -> Result<FaultReceiver>;

    /// Stop watching. After this returns no new events are delivered.
    fn stop(&mut self) -> Result<()>;
}

/// Notification mechanism used by [`NotifyWatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum WatcherBackend {
    /// OS-native notifications (inotify, FSEvents, ReadDirectoryChangesW).
    #[default]
    Native,
    /// Periodic rescans, for filesystems without native notifications.
    Poll { interval: Duration },
}

/// [`ChangeSource`] backed by the `notify` crate.
pub struct NotifyWatcher {
    backend: WatcherBackend,
    active: Option<ActiveWatch>,
}

struct ActiveWatch {
    watcher: Box<dyn Watcher + Send>,
    path: PathBuf,
}

impl NotifyWatcher {
    /// Create a watcher using the given backend. Nothing is watched until
    /// [`ChangeSource::start`] is called.
    pub fn new(backend: WatcherBackend) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Whether a watch is currently active.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

impl ChangeSource for NotifyWatcher {
    fn start(&mut self, target: &WatchTarget, sink: Arc<ChangeSink>) -> Result<FaultReceiver> {
        if self.active.is_some() {
            return Err(Error::Watcher("Watcher is already running".to_string()));
        }

        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let forwarder = EventForwarder {
            root: target.as_path().to_path_buf(),
            sink,
            faults: fault_tx,
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.backend {
            WatcherBackend::Native => Box::new(
                RecommendedWatcher::new(forwarder, Config::default()).map_err(watcher_error)?,
            ),
            WatcherBackend::Poll { interval } => Box::new(
                PollWatcher::new(forwarder, Config::default().with_poll_interval(interval))
                    .map_err(watcher_error)?,
            ),
        };

        watcher
            .watch(target.as_path(), RecursiveMode::Recursive)
            .map_err(watcher_error)?;

        info!("Watching {} ({:?})", target, self.backend);
        self.active = Some(ActiveWatch {
            watcher,
            path: target.as_path().to_path_buf(),
        });

        Ok(fault_rx)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };

        if let Err(e) = active.watcher.unwatch(&active.path) {
            // The directory may already be gone; dropping the watcher still
            // tears the subscription down.
            warn!("Failed to unwatch {}: {}", active.path.display(), e);
        }
        drop(active);

        info!("Watcher stopped");
        Ok(())
    }
}

impl Drop for NotifyWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn watcher_error(err: notify::Error) -> Error {
    Error::Watcher(err.to_string())
}

/// Receives raw `notify` callbacks on the watcher's own thread.
struct EventForwarder {
    root: PathBuf,
    sink: Arc<ChangeSink>,
    faults: mpsc::UnboundedSender<Error>,
}

impl notify::EventHandler for EventForwarder {
    fn handle_event(&mut self, event: notify::Result<notify::Event>) {
        match event {
            Ok(event) => {
                if let Some(path) = rename_half(&event) {
                    self.sink.on_partial(path);
                } else if let Some(change) = map_event(&self.root, &event) {
                    self.sink.record(&change);
                }
            }
            Err(err) if is_transient(&err) => {
                // An event may have been lost; treat it as a change so the
                // tree still gets synced.
                warn!("Transient watcher error: {}", err);
                self.sink.on_modified(&self.root, true);
            }
            Err(err) => {
                error!("File watcher error: {}", err);
                let _ = self.faults.send(watcher_error(err));
            }
        }
    }
}

fn is_transient(err: &notify::Error) -> bool {
    matches!(
        err.kind,
        notify::ErrorKind::Io(_) | notify::ErrorKind::PathNotFound
    )
}

/// Path of a one-sided rename notification.
///
/// inotify reports a rename inside the tree as `From`, `To` and then `Both`.
/// The halves still count as changes (the other side may be outside the
/// tree) but only the `Both` event is reported as a move.
fn rename_half(event: &notify::Event) -> Option<&Path> {
    if event.need_rescan() {
        return None;
    }
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::From | RenameMode::To)) => {
            event.paths.first().map(PathBuf::as_path)
        }
        _ => None,
    }
}

/// Convert a raw `notify` event into a [`ChangeEvent`].
///
/// Access events, unknown kinds and rename halves are ignored. A rescan
/// request (the OS dropped events) is reported as a modification of the
/// watch root.
fn map_event(root: &Path, event: &notify::Event) -> Option<ChangeEvent> {
    if event.need_rescan() {
        debug!("Watcher requested rescan");
        return Some(ChangeEvent::Modified {
            path: root.to_path_buf(),
            is_dir: true,
        });
    }

    let path = event.paths.first()?.clone();

    match &event.kind {
        EventKind::Create(kind) => {
            let is_dir = match kind {
                CreateKind::Folder => true,
                CreateKind::File => false,
                _ => path.is_dir(),
            };
            Some(ChangeEvent::Created { path, is_dir })
        }

        EventKind::Remove(kind) => Some(ChangeEvent::Deleted {
            path,
            is_dir: matches!(kind, RemoveKind::Folder),
        }),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            let to = event.paths[1].clone();
            let is_dir = to.is_dir();
            Some(ChangeEvent::Moved {
                from: path,
                to,
                is_dir,
            })
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From | RenameMode::To)) => None,

        EventKind::Modify(_) | EventKind::Any => {
            let is_dir = path.is_dir();
            Some(ChangeEvent::Modified { path, is_dir })
        }

        EventKind::Access(_) | EventKind::Other => None,
    }
}
