//! Debounce controller - decides when the tree has been quiet long enough.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::marker::ChangeMarker;

/// Default quiet period required before syncing.
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_secs(120);
/// Default re-evaluation period of the control loop.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a single debounce evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing to do: no pending change, or changes are still settling.
    Idle,
    /// The quiet interval has elapsed since the change recorded at
    /// `changed_at`; a sync should run now.
    PendingSync { changed_at: Instant },
}

/// Evaluates the shared [`ChangeMarker`] against the quiet interval.
///
/// The controller keeps no queue of changes. Any number of events inside one
/// quiet window collapse into a single sync trigger.
#[derive(Debug, Clone)]
pub struct DebounceController {
    marker: Arc<ChangeMarker>,
    quiet_interval: Duration,
}

impl DebounceController {
    /// Create a controller over `marker`.
    pub fn new(marker: Arc<ChangeMarker>, quiet_interval: Duration) -> Self {
        Self {
            marker,
            quiet_interval,
        }
    }

    /// The configured quiet interval.
    pub fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }

    /// The marker being evaluated.
    pub fn marker(&self) -> &Arc<ChangeMarker> {
        &self.marker
    }

    /// Evaluate the state at the current time.
    pub fn poll(&self) -> DebounceState {
        self.poll_at(Instant::now())
    }

    /// Evaluate the state at `now`.
    pub fn poll_at(&self, now: Instant) -> DebounceState {
        match self.marker.get() {
            Some(changed_at) if now.saturating_duration_since(changed_at) >= self.quiet_interval => {
                DebounceState::PendingSync { changed_at }
            }
            _ => DebounceState::Idle,
        }
    }

    /// Record that the change observed at `changed_at` has been synced.
    ///
    /// Returns `false` if a newer change arrived while syncing; the marker
    /// then keeps that newer time and another sync follows after its own
    /// quiet window.
    pub fn complete(&self, changed_at: Instant) -> bool {
        self.marker.clear_if(changed_at)
    }

    /// Restart the quiet window at `now`, scheduling a retry one full
    /// quiet interval later.
    pub fn rearm(&self, now: Instant) {
        self.marker.touch_at(now);
    }
}
