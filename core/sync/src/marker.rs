//! The shared "last change" timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Sentinel stored when no change is pending.
const UNSET: u64 = u64::MAX;

/// Time of the most recent observed filesystem change, or unset.
///
/// Written from watcher callbacks and read/cleared from the polling loop.
/// The value is a single atomic offset from a fixed origin, so every access
/// is one load or store and no lock is held across threads.
#[derive(Debug)]
pub struct ChangeMarker {
    /// Reference point the stored offsets are measured from.
    origin: Instant,
    /// Nanoseconds since `origin`, or `UNSET`.
    offset: AtomicU64,
}

impl ChangeMarker {
    /// Create an unset marker.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: AtomicU64::new(UNSET),
        }
    }

    /// Record a change at the current time.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    /// Record a change at the given instant, replacing any previous value.
    pub fn touch_at(&self, at: Instant) {
        self.offset.store(self.encode(at), Ordering::Release);
    }

    /// Forget the pending change.
    pub fn clear(&self) {
        self.offset.store(UNSET, Ordering::Release);
    }

    /// Clear the marker only if it still holds `observed`.
    ///
    /// Returns `false` when a newer change was recorded in the meantime, in
    /// which case the marker is left untouched.
    pub fn clear_if(&self, observed: Instant) -> bool {
        self.offset
            .compare_exchange(
                self.encode(observed),
                UNSET,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Time of the most recent change, if any.
    pub fn get(&self) -> Option<Instant> {
        match self.offset.load(Ordering::Acquire) {
            UNSET => None,
            nanos => Some(self.origin + Duration::from_nanos(nanos)),
        }
    }

    /// Whether a change is pending.
    pub fn is_set(&self) -> bool {
        self.offset.load(Ordering::Acquire) != UNSET
    }

    /// Whether a change is pending and at least `interval` has passed since it.
    pub fn is_quiet(&self, now: Instant, interval: Duration) -> bool {
        self.get()
            .is_some_and(|changed| now.saturating_duration_since(changed) >= interval)
    }

    fn encode(&self, at: Instant) -> u64 {
        // Clamp so a real timestamp can never collide with the sentinel.
        let nanos = at.saturating_duration_since(self.origin).as_nanos();
        u64::try_from(nanos).unwrap_or(UNSET - 1).min(UNSET - 1)
    }
}

impl Default for ChangeMarker {
    fn default() -> Self {
        Self::new()
    }
}
