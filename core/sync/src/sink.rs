//! Change event sink - records when the watched tree last changed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::marker::ChangeMarker;

/// A filesystem change reported by a watcher backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file or directory was created.
    Created { path: PathBuf, is_dir: bool },
    /// A file or directory was deleted.
    Deleted { path: PathBuf, is_dir: bool },
    /// A file or directory was moved or renamed.
    Moved {
        from: PathBuf,
        to: PathBuf,
        is_dir: bool,
    },
    /// A file or directory was modified.
    Modified { path: PathBuf, is_dir: bool },
}

impl ChangeEvent {
    /// Whether the event concerns a directory.
    pub fn is_dir(&self) -> bool {
        match self {
            ChangeEvent::Created { is_dir, .. }
            | ChangeEvent::Deleted { is_dir, .. }
            | ChangeEvent::Moved { is_dir, .. }
            | ChangeEvent::Modified { is_dir, .. } => *is_dir,
        }
    }

    /// Primary path of the event. For moves this is the destination.
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created { path, .. }
            | ChangeEvent::Deleted { path, .. }
            | ChangeEvent::Modified { path, .. } => path,
            ChangeEvent::Moved { to, .. } => to,
        }
    }
}

fn describe(is_dir: bool) -> &'static str {
    if is_dir {
        "directory"
    } else {
        "file"
    }
}

/// Receives change notifications and stamps the shared [`ChangeMarker`].
///
/// The sink keeps no record of *what* changed, only *when*. Once closed it
/// drops every further notification, which lets teardown guarantee that no
/// callback affects the marker after the watcher is stopped.
#[derive(Debug)]
pub struct ChangeSink {
    marker: Arc<ChangeMarker>,
    closed: AtomicBool,
}

impl ChangeSink {
    /// Create a sink writing to `marker`.
    pub fn new(marker: Arc<ChangeMarker>) -> Self {
        Self {
            marker,
            closed: AtomicBool::new(false),
        }
    }

    /// Marker this sink writes to.
    pub fn marker(&self) -> &Arc<ChangeMarker> {
        &self.marker
    }

    /// Notify that an object was created.
    pub fn on_created(&self, path: &Path, is_dir: bool) {
        if self.accepting() {
            info!("Created {}: {}", describe(is_dir), path.display());
            self.marker.touch();
        }
    }

    /// Notify that an object was deleted.
    pub fn on_deleted(&self, path: &Path, is_dir: bool) {
        if self.accepting() {
            info!("Deleted {}: {}", describe(is_dir), path.display());
            self.marker.touch();
        }
    }

    /// Notify that an object was moved from `from` to `to`.
    pub fn on_moved(&self, from: &Path, to: &Path, is_dir: bool) {
        if self.accepting() {
            info!(
                "Moved {}: from {} to {}",
                describe(is_dir),
                from.display(),
                to.display()
            );
            self.marker.touch();
        }
    }

    /// Notify that an object was modified.
    pub fn on_modified(&self, path: &Path, is_dir: bool) {
        if self.accepting() {
            info!("Modified {}: {}", describe(is_dir), path.display());
            self.marker.touch();
        }
    }

    /// Note a change that is only part of a larger notification, such as
    /// one half of a rename. Logged at debug level.
    pub fn on_partial(&self, path: &Path) {
        if self.accepting() {
            debug!("Changed: {}", path.display());
            self.marker.touch();
        }
    }

    /// Dispatch a typed event to the matching entry point.
    pub fn record(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::Created { path, is_dir } => self.on_created(path, *is_dir),
            ChangeEvent::Deleted { path, is_dir } => self.on_deleted(path, *is_dir),
            ChangeEvent::Moved { from, to, is_dir } => self.on_moved(from, to, *is_dir),
            ChangeEvent::Modified { path, is_dir } => self.on_modified(path, *is_dir),
        }
    }

    /// Stop accepting notifications.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn accepting(&self) -> bool {
        let open = !self.is_closed();
        if !open {
            debug!("Dropping change notification after shutdown");
        }
        open
    }
}
