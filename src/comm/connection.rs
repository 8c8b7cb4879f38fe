//! Connection lifecycle tracking.
//!
//! One mutex-guarded state machine with defined legal transitions, plus
//! a coarse-grained monitor thread reconciling the desired state with
//! what the transport actually reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::{Error, Result};
use crate::work::RunFlag;

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    /// Legal edges of the lifecycle machine.
    fn can_reach(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnecting)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }
}

/// The transport being tracked. Login/logout are asynchronous; the
/// monitor keeps polling until the observed state matches.
pub trait ConnectionProbe: Send + Sync {
    /// Is the transport connected right now
    fn is_connected(&self) -> bool;

    /// Begin an asynchronous login/connect
    fn start_connect(&self);

    /// Begin an asynchronous logout/disconnect
    fn start_disconnect(&self);
}

/// Tracks the connection lifecycle and owns its legal transitions.
pub struct ConnectionTracker {
    state: Mutex<ConnectionState>,
    should_be_online: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Disconnected),
            should_be_online: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Request a transition; errors on an illegal edge.
    pub fn transition(&self, next: ConnectionState) -> Result<ConnectionState> {
        let mut state = self.state.lock().unwrap();
        if !state.can_reach(next) {
            return Err(Error::Connection(format!(
                "illegal transition {:?} -> {:?}",
                *state, next
            )));
        }
        log::info!("connection: {:?} -> {:?}", *state, next);
        *state = next;
        Ok(next)
    }

    /// Ask the monitor to bring the connection up.
    pub fn request_connect(&self) {
        self.should_be_online.store(true, Ordering::Release);
    }

    /// Ask the monitor to bring the connection down.
    pub fn request_disconnect(&self) {
        self.should_be_online.store(false, Ordering::Release);
    }

    pub fn should_be_online(&self) -> bool {
        self.should_be_online.load(Ordering::Acquire)
    }

    /// Spawn the reconciliation thread. It polls `probe` every
    /// `interval` (≈1 s in production), drives state transitions from
    /// the poll loop only, and exits when the process stops running.
    pub fn spawn_monitor(
        self: Arc<Self>,
        probe: Arc<dyn ConnectionProbe>,
        run: RunFlag,
        interval: Duration,
    ) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("connection-monitor".to_string())
            .spawn(move || {
                while run.is_running() {
                    self.reconcile(&*probe);
                    std::thread::sleep(interval);
                }
            })
            .expect("failed to spawn connection monitor")
    }

    /// One reconciliation step: compare desired and observed state,
    /// advance the machine by at most one edge.
    fn reconcile(&self, probe: &dyn ConnectionProbe) {
        use ConnectionState::*;

        let observed = probe.is_connected();
        match (self.should_be_online(), observed, self.state()) {
            (true, _, Disconnected) => {
                if self.transition(Connecting).is_ok() && !observed {
                    probe.start_connect();
                }
            }
            (true, true, Connecting) => {
                let _ = self.transition(Connected);
            }
            (false, true, Connected) => {
                if self.transition(Disconnecting).is_ok() {
                    probe.start_disconnect();
                }
            }
            (false, _, Connecting) => {
                // login abandoned before it completed
                if self.transition(Disconnecting).is_ok() && observed {
                    probe.start_disconnect();
                }
            }
            (_, false, Disconnecting) => {
                let _ = self.transition(Disconnected);
            }
            (_, false, Connected) => {
                // the transport dropped out from under us
                log::warn!("connection lost");
                let _ = self.transition(Disconnecting);
            }
            _ => {}
        }
    }
}
