//! Per-region backlog queues and the online/offline gate.
//!
//! Events can arrive before their region is ready to accept them (its
//! root placement does not exist yet). The gate captures such events in
//! a per-region queue; when the region comes online the queue is
//! detached and replayed in strict arrival order before anything newer
//! is accepted as live.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::work::{OnDemandQueue, WorkOutcome};
use crate::world::{RegionContext, RegionId, RegionState};

/// What the gate did with an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// The region was online; the action ran on the calling thread.
    Applied,
    /// The action was captured into the region's backlog.
    Queued,
}

/// Registry of backlog queues, at most one per region.
///
/// The registry mutex is scoped to lookup/insert/remove (plus the
/// enqueue of a deferred action, so a concurrent transition cannot lose
/// it); the transition drain itself runs unlocked so other regions are
/// never blocked behind a replay.
pub struct BacklogRegistry {
    queues: Mutex<HashMap<RegionId, Arc<OnDemandQueue>>>,
}

impl BacklogRegistry {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Gate an action on region readiness. Online regions apply the
    /// action immediately; otherwise it is queued for the transition
    /// replay and the caller must not apply it itself.
    pub fn gate<F>(&self, region: &Arc<RegionContext>, action: F) -> GateOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut queues = self.queues.lock().unwrap();
            if !region.is_online() {
                let queue = queues.entry(region.id().clone()).or_insert_with(|| {
                    log::debug!("backlog: creating queue for {}", region.id());
                    Arc::new(OnDemandQueue::new(&format!("backlog:{}", region.id())))
                });
                // Neutral priority: replay order is pure arrival order
                let mut action = Some(action);
                queue.enqueue(
                    0,
                    1,
                    Box::new(move |_| {
                        if let Some(f) = action.take() {
                            f();
                        }
                        Ok(WorkOutcome::Done)
                    }),
                );
                return GateOutcome::Queued;
            }
        }

        action();
        GateOutcome::Applied
    }

    /// Run the online transition for a region: mark it online and detach
    /// its queue under the registry mutex, then replay the queue FIFO
    /// outside it. Gate calls made after the detach pass straight
    /// through; the replay completes before this returns.
    ///
    /// Returns the number of replayed events.
    pub fn transition_online(&self, region: &Arc<RegionContext>) -> usize {
        let queue = {
            let mut queues = self.queues.lock().unwrap();
            region.set_state(RegionState::Online);
            queues.remove(region.id())
        };

        match queue {
            Some(queue) => {
                let depth = queue.len();
                log::debug!(
                    "backlog: replaying {} deferred events for {}",
                    depth,
                    region.id()
                );
                queue.drain();
                depth
            }
            None => 0,
        }
    }

    /// Depth of a region's backlog, if one exists.
    pub fn depth(&self, region: &RegionId) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(region)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    /// Number of regions currently holding a backlog.
    pub fn queue_count(&self) -> usize {
        self.queues.lock().unwrap().len()
    }
}

impl Default for BacklogRegistry {
    fn default() -> Self {
        Self::new()
    }
}
