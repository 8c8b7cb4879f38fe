//! Scheduler statistics counters.
//!
//! Cheap atomic counters bumped from any thread; `snapshot` produces a
//! serializable view for status displays.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for scheduler activity. All methods are lock-free.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    meshes_requested: AtomicU64,
    materials_requested: AtomicU64,
    textures_requested: AtomicU64,
    items_executed: AtomicU64,
    items_requeued: AtomicU64,
    items_failed: AtomicU64,
    events_deferred: AtomicU64,
    fetches_escalated: AtomicU64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh_requested(&self) {
        self.meshes_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn material_requested(&self) {
        self.materials_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn texture_requested(&self) {
        self.textures_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_executed(&self) {
        self.items_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_requeued(&self) {
        self.items_requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_deferred(&self) {
        self.events_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_escalated(&self) {
        self.fetches_escalated.fetch_add(1, Ordering::Relaxed);
    }

    /// Capture the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            meshes_requested: self.meshes_requested.load(Ordering::Relaxed),
            materials_requested: self.materials_requested.load(Ordering::Relaxed),
            textures_requested: self.textures_requested.load(Ordering::Relaxed),
            items_executed: self.items_executed.load(Ordering::Relaxed),
            items_requeued: self.items_requeued.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            events_deferred: self.events_deferred.load(Ordering::Relaxed),
            fetches_escalated: self.fetches_escalated.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the scheduler counters.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub meshes_requested: u64,
    pub materials_requested: u64,
    pub textures_requested: u64,
    pub items_executed: u64,
    pub items_requeued: u64,
    pub items_failed: u64,
    pub events_deferred: u64,
    pub fetches_escalated: u64,
}
