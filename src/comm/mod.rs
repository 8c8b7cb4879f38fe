//! Network-facing side of the scheduler: the event handler interface,
//! the context gate, and connection lifecycle tracking.

pub mod event;
pub mod backlog;
pub mod connection;
pub mod adapter;

pub use event::{EntityPayload, WorldEventHandler};
pub use backlog::{BacklogRegistry, GateOutcome};
pub use connection::{ConnectionProbe, ConnectionState, ConnectionTracker};
pub use adapter::CommAdapter;
