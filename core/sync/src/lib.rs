//! quietsync daemon core
//!
//! Watches a local directory tree and, once it has been quiet for a
//! configurable interval, mirrors it to a remote target:
//! - Change sink recording only the time of the latest change
//! - Debounce controller deciding when the tree has settled
//! - Sync executor with retry after another quiet interval on failure
//! - Connectivity gate holding startup until the network is up
//! - Daemon lifecycle with orderly watcher teardown

pub mod config;
pub mod connectivity;
pub mod daemon;
pub mod debounce;
pub mod executor;
pub mod marker;
pub mod rclone;
pub mod sink;
pub mod watcher;

// Re-export main types
pub use config::DaemonConfig;
pub use connectivity::{ConnectivityGate, ConnectivityProbe, TcpProbe};
pub use daemon::{Daemon, DefaultDaemon, LoopExit};
pub use debounce::{DebounceController, DebounceState};
pub use executor::{SyncBackend, SyncExecutor, SyncOutcome};
pub use marker::ChangeMarker;
pub use rclone::{RcloneBackend, RcloneConfig};
pub use sink::{ChangeEvent, ChangeSink};
pub use watcher::{ChangeSource, FaultReceiver, NotifyWatcher, WatcherBackend};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_module_exports() {
        // Verify all main types are accessible
        let marker = Arc::new(ChangeMarker::new());
        let _sink = ChangeSink::new(marker.clone());
        let _controller = DebounceController::new(marker, debounce::DEFAULT_QUIET_INTERVAL);
        let _probe = TcpProbe::default();
        let _backend = RcloneBackend::default();
        let _watcher = NotifyWatcher::new(WatcherBackend::default());
    }
}
