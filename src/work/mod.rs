//! Deferred work scheduling: priority queues, the continuous worker, and
//! the budgeted on-demand queue.

pub mod item;
pub mod queue;
pub mod worker;
pub mod on_demand;

pub use item::{Attempt, RunFlag, WorkFn, WorkItem, WorkOutcome};
pub use queue::PriorityQueue;
pub use worker::WorkerQueue;
pub use on_demand::OnDemandQueue;
