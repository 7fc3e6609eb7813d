//! Sync executor - runs the sync operation and feeds the outcome back into
//! the debounce controller.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use quietsync_common::{RemoteTarget, SyncError, WatchTarget};

use crate::debounce::{DebounceController, DebounceState};

/// Whole-tree, one-directional sync operation.
///
/// Implementations must be safe to re-invoke after a failure.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Backend name for logging (e.g., "rclone").
    fn name(&self) -> &str;

    /// Mirror `source` onto `dest`.
    async fn sync(&self, source: &WatchTarget, dest: &RemoteTarget) -> Result<(), SyncError>;

    /// Check that `dest` is usable. Called once at startup.
    async fn verify(&self, _dest: &RemoteTarget) -> Result<(), SyncError> {
        Ok(())
    }
}

/// Result of one sync attempt.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The tree was synced and no change arrived meanwhile.
    Synced,
    /// The sync succeeded but the tree changed while it ran; another sync
    /// follows after the new quiet window.
    SyncedWithPendingChanges,
    /// The sync failed; a retry is scheduled one quiet interval from now.
    Failed(SyncError),
}

impl SyncOutcome {
    /// Whether the sync operation itself succeeded.
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncOutcome::Failed(_))
    }
}

/// Invokes a [`SyncBackend`] when the controller signals a pending sync.
pub struct SyncExecutor<B> {
    backend: B,
    source: WatchTarget,
    dest: RemoteTarget,
    controller: DebounceController,
    consecutive_failures: u32,
}

impl<B: SyncBackend> SyncExecutor<B> {
    /// Create an executor syncing `source` to `dest`.
    pub fn new(
        backend: B,
        source: WatchTarget,
        dest: RemoteTarget,
        controller: DebounceController,
    ) -> Self {
        Self {
            backend,
            source,
            dest,
            controller,
            consecutive_failures: 0,
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The debounce controller driving this executor.
    pub fn controller(&self) -> &DebounceController {
        &self.controller
    }

    /// Number of failed attempts since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Verify the destination once at startup.
    ///
    /// A failure is only logged: later sync attempts retry on their own.
    pub async fn verify_remote(&self) {
        match self.backend.verify(&self.dest).await {
            Ok(()) => info!("Remote {} is accessible", self.dest),
            Err(e) => warn!("Could not verify remote {}: {}", self.dest, e),
        }
    }

    /// Evaluate the debounce state and sync if the quiet interval elapsed.
    ///
    /// Returns `None` when nothing was due.
    pub async fn tick(&mut self) -> Option<SyncOutcome> {
        match self.controller.poll() {
            DebounceState::Idle => None,
            DebounceState::PendingSync { changed_at } => Some(self.execute(changed_at).await),
        }
    }

    /// Run one sync attempt for the change recorded at `changed_at`.
    ///
    /// The marker is left alone while the attempt is in flight. Success
    /// clears it; failure resets it to the current time.
    pub async fn execute(&mut self, changed_at: Instant) -> SyncOutcome {
        info!(
            "Syncing {} to {} via {}",
            self.source,
            self.dest,
            self.backend.name()
        );
        let started = Instant::now();

        match self.backend.sync(&self.source, &self.dest).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                info!("Sync completed in {:?}", started.elapsed());

                if self.controller.complete(changed_at) {
                    SyncOutcome::Synced
                } else {
                    info!("Changes arrived during sync, another sync will follow");
                    SyncOutcome::SyncedWithPendingChanges
                }
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                error!(
                    "Sync failed ({} consecutive): {}",
                    self.consecutive_failures, e
                );
                self.controller.rearm(Instant::now());
                info!(
                    "Retrying in {:?} unless new changes arrive",
                    self.controller.quiet_interval()
                );
                SyncOutcome::Failed(e)
            }
        }
    }
}
