//! Continuous worker queue: a dedicated thread drains a priority queue.

use std::sync::{Arc, Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use super::item::{RunFlag, WorkFn, WorkOutcome};
use super::queue::PriorityQueue;

struct Shared {
    queue: Mutex<PriorityQueue>,
    available: Condvar,
    /// Stops this worker alone, independent of the process-wide flag
    detached: AtomicBool,
}

/// A priority queue drained by its own named thread.
///
/// The thread suspends when the queue is empty and wakes on enqueue or
/// shutdown. A not-yet-ready item is requeued with its retry count
/// incremented; a failed item is logged and dropped. The worker observes
/// the process-wide [`RunFlag`] between items and exits immediately when
/// it stops — items still queued at that point are discarded.
pub struct WorkerQueue {
    name: String,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerQueue {
    /// Spawn the worker thread. Stopping `run` stops every worker that
    /// shares it.
    pub fn new(name: &str, run: RunFlag) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(PriorityQueue::new()),
            available: Condvar::new(),
            detached: AtomicBool::new(false),
        });

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                let name = name.to_string();
                move || worker_loop(&name, &shared, &run)
            })
            .expect("failed to spawn worker thread");

        Self {
            name: name.to_string(),
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a work item. Wakes the worker if it is suspended.
    pub fn enqueue(&self, priority: u32, cost: u32, action: WorkFn) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.enqueue(priority, cost, action);
        }
        self.shared.available.notify_one();
    }

    /// Number of items waiting (excludes the one being executed).
    pub fn len(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop this worker and wait for its thread to exit. Items still
    /// queued are dropped, matching process shutdown behavior.
    pub fn stop_and_join(&self) {
        self.shared.detached.store(true, Ordering::Release);
        self.shared.available.notify_all();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker_loop(name: &str, shared: &Shared, run: &RunFlag) {
    log::debug!("{}: worker thread started", name);

    loop {
        if !run.is_running() || shared.detached.load(Ordering::Acquire) {
            break;
        }

        let item = shared.queue.lock().unwrap().dequeue();
        let Some(mut item) = item else {
            let guard = shared.queue.lock().unwrap();
            // Re-check emptiness under the lock so a notify between the
            // dequeue above and this wait is not lost; the timeout covers
            // a RunFlag stop with no accompanying notify.
            if guard.is_empty() {
                let _ = shared
                    .available
                    .wait_timeout(guard, Duration::from_millis(100))
                    .unwrap();
            }
            continue;
        };

        match item.run() {
            Ok(WorkOutcome::Done) => {}
            Ok(WorkOutcome::NotYetReady) => {
                shared.queue.lock().unwrap().requeue(item);
            }
            Err(e) => {
                log::error!("{}: work item failed: {}", name, e);
            }
        }
    }

    let dropped = shared.queue.lock().unwrap().len();
    if dropped > 0 {
        log::debug!("{}: exiting with {} items still queued", name, dropped);
    }
}
