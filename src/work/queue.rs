//! Ordered container for deferred work.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::item::{WorkFn, WorkItem};

/// Heap entry wrapper so the binary heap pops the most urgent item first.
struct Entry(WorkItem);

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.sequence == other.0.sequence
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest (priority,
        // sequence) pair wins. Equal priorities keep arrival order.
        (other.0.priority, other.0.sequence).cmp(&(self.0.priority, self.0.sequence))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority-ordered queue of work items.
///
/// Items are totally ordered by (priority ascending, sequence ascending);
/// the queue assigns sequence numbers at enqueue so equal priorities
/// preserve arrival order. Not thread-safe on its own; the worker and
/// on-demand queues wrap it in a mutex.
pub struct PriorityQueue {
    heap: BinaryHeap<Entry>,
    next_sequence: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Add a fresh work item.
    pub fn enqueue(&mut self, priority: u32, cost: u32, action: WorkFn) {
        let sequence = self.next_sequence();
        self.heap.push(Entry(WorkItem {
            action,
            priority,
            cost,
            sequence,
            retries: 0,
        }));
    }

    /// Put an item back after a not-yet-ready attempt. The priority is
    /// unchanged but the sequence is reassigned, so the item lands at the
    /// tail of its priority class instead of blocking equal-priority peers.
    pub fn requeue(&mut self, mut item: WorkItem) {
        item.sequence = self.next_sequence();
        item.retries += 1;
        self.heap.push(Entry(item));
    }

    /// Remove and return the most urgent item. `None` means empty — a
    /// control signal, not an error.
    pub fn dequeue(&mut self) -> Option<WorkItem> {
        self.heap.pop().map(|e| e.0)
    }

    /// Inspect the most urgent item without removing it.
    pub fn peek(&self) -> Option<&WorkItem> {
        self.heap.peek().map(|e| &e.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
