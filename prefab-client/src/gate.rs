//! One-shot initialization signal shared by lookups and the fetch task.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Opens once the first snapshot has been applied; never closes again.
///
/// Blocking waiters park on a condvar, async waiters on a [`Notify`].
#[derive(Debug, Default)]
pub struct InitGate {
    open: Mutex<bool>,
    signal: Condvar,
    notify: Notify,
}

impl InitGate {
    /// A closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate that is already open.
    pub fn opened() -> Self {
        let gate = Self::default();
        *gate.open.lock() = true;
        gate
    }

    pub fn open(&self) {
        let mut open = self.open.lock();
        if !*open {
            *open = true;
            self.signal.notify_all();
            self.notify.notify_waiters();
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Block until the gate opens or `timeout` passes. Returns whether it
    /// is open.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.open.lock();
        while !*open {
            if self.signal.wait_until(&mut open, deadline).timed_out() {
                break;
            }
        }
        *open
    }

    /// Resolve once the gate is open.
    pub async fn wait_open(&self) {
        loop {
            // registered before the check so an open() in between is not lost
            let notified = self.notify.notified();
            if self.is_open() {
                return;
            }
            notified.await;
        }
    }
}
