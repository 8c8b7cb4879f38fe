//! Budgeted on-demand queue, drained only when its owner pumps it.

use std::sync::Mutex;

use super::item::{WorkFn, WorkOutcome};
use super::queue::PriorityQueue;

/// A priority queue with no thread of its own.
///
/// The owner calls [`pump`](Self::pump) with a cost budget — typically
/// once per displayed frame — and the queue executes items until the
/// budget is spent or the queue empties. Under sustained overload the
/// depth grows (watch [`len`](Self::len)) rather than the pump time.
pub struct OnDemandQueue {
    name: String,
    inner: Mutex<PriorityQueue>,
}

impl OnDemandQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(PriorityQueue::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a work item for a later pump.
    pub fn enqueue(&self, priority: u32, cost: u32, action: WorkFn) {
        self.inner.lock().unwrap().enqueue(priority, cost, action);
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One bounded drain pass. Executes items in (priority, arrival)
    /// order, charging each item's cost as it starts; no item starts once
    /// the accumulated cost has reached `budget`, so a single item may
    /// overshoot by at most its own cost. Not-yet-ready items go back to
    /// the tail of their priority class. Never blocks on empty.
    ///
    /// Returns the number of items still queued.
    pub fn pump(&self, budget: u32) -> usize {
        let mut spent: u64 = 0;

        loop {
            if spent >= u64::from(budget) {
                break;
            }
            let item = self.inner.lock().unwrap().dequeue();
            let Some(mut item) = item else {
                break;
            };
            spent += u64::from(item.cost());

            match item.run() {
                Ok(WorkOutcome::Done) => {}
                Ok(WorkOutcome::NotYetReady) => {
                    self.inner.lock().unwrap().requeue(item);
                }
                Err(e) => {
                    log::error!("{}: work item failed: {}", self.name, e);
                }
            }
        }

        self.len()
    }

    /// Drain everything regardless of cost, in strict queue order. Used
    /// for backlog replay when a region comes online; keeps pumping while
    /// requeued items remain.
    pub fn drain(&self) {
        while self.pump(u32::MAX) > 0 {}
    }
}
