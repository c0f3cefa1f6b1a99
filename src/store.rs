//! Versioned holder for the latest published snapshot.
//!
//! One slot, latest wins. The snapshot and its version live behind the same
//! `RwLock`, so a reader always gets a version that belongs to the snapshot it
//! was handed. Critical sections are an `Arc` clone or swap, never I/O.

use std::sync::{Arc, RwLock};

use crate::snapshot::Snapshot;

#[derive(Default)]
struct Slot {
    snapshot: Arc<Snapshot>,
    version: u64,
}

/// Thread-safe, cheaply cloneable handle to the latest snapshot.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    slot: Arc<RwLock<Slot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held snapshot and bump the version. Returns the new version.
    pub fn set(&self, snapshot: Snapshot) -> u64 {
        let snapshot = Arc::new(snapshot);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.snapshot = snapshot;
        slot.version += 1;
        slot.version
    }

    /// Latest snapshot and its version in one observation.
    ///
    /// Before the first `set` this is the zero-value snapshot at version 0.
    pub fn get(&self) -> (Arc<Snapshot>, u64) {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        (Arc::clone(&slot.snapshot), slot.version)
    }

    pub fn version(&self) -> u64 {
        self.get().1
    }
}
