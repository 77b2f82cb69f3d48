//! State shared between the detection loop and the control surface.
//!
//! Exactly two things cross the thread boundary:
//! - the latest [`SystemSnapshot`], replaced whole once per tick
//!   (single writer, many readers, last write wins)
//! - the `system_enabled` kill-switch flag
//!
//! The snapshot lives behind an `Arc` that is swapped, never mutated. The lock
//! only guards the pointer swap/clone, so readers never see a half-written
//! snapshot and never hold the lock while serializing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::SystemSnapshot;

/// Atomically replaceable snapshot slot.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<SystemSnapshot>>,
}

impl SnapshotCell {
    pub fn new(initial: SystemSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Replace the published snapshot.
    pub fn publish(&self, snapshot: SystemSnapshot) {
        let next = Arc::new(snapshot);
        *self.current.write() = next;
    }

    /// Latest complete snapshot.
    pub fn load(&self) -> Arc<SystemSnapshot> {
        Arc::clone(&*self.current.read())
    }
}

/// Cloneable handle given to the control collaborator.
///
/// Safe to use from any thread while the detection loop runs.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    snapshot: Arc<SnapshotCell>,
    enabled: Arc<AtomicBool>,
}

impl ControlHandle {
    pub fn new(enabled: bool) -> Self {
        Self {
            snapshot: Arc::new(SnapshotCell::new(SystemSnapshot::initial(enabled))),
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn get_snapshot(&self) -> Arc<SystemSnapshot> {
        self.snapshot.load()
    }

    /// Kill switch. `false` silences the alarm on the next tick; the loop keeps running.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip the kill switch, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, snapshot: SystemSnapshot) {
        self.snapshot.publish(snapshot);
    }
}
