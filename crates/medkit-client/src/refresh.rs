//! Single-flight token refresh coordination
//!
//! At most one refresh call runs per client. The first request to hit a 401
//! takes the lease and performs the refresh; every request that fails while
//! the lease is held gets a waiter instead and is completed with the lease
//! holder's outcome.
//!
//! State transitions:
//! - Idle → Refreshing (first 401 of a burst, synchronously under the lock)
//! - Refreshing → Refreshing (later 401s append a waiter, in arrival order)
//! - Refreshing → Idle (lease settled or dropped; waiters drained in order)

use std::sync::{Mutex, MutexGuard, PoisonError};

use common::Secret;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// What a refresh hands to the requests waiting on it: the new access token
/// or the failure that ended the session.
pub type RefreshOutcome = Result<Secret<String>>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Per-client refresh state. Never shared between clients.
pub struct RefreshGate {
    state: Mutex<RefreshState>,
}

/// Result of asking the gate to refresh.
pub enum Ticket<'a> {
    /// No refresh was running; the caller must perform it and settle.
    Lead(RefreshLease<'a>),
    /// A refresh is already running; await its outcome.
    Wait(Waiter),
}

/// Exclusive right to perform the current refresh.
///
/// Dropping the lease without settling (the leading request was cancelled)
/// fails every waiter and returns the gate to idle.
pub struct RefreshLease<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

/// Pending completion for a request queued behind a running refresh.
pub struct Waiter(oneshot::Receiver<RefreshOutcome>);

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Take the lease if idle, otherwise join the queue.
    pub fn begin(&self) -> Ticket<'_> {
        let mut state = self.lock();
        match &mut *state {
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    waiters: Vec::new(),
                };
                debug!("refresh lease taken");
                Ticket::Lead(RefreshLease {
                    gate: self,
                    settled: false,
                })
            }
            RefreshState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                debug!(position = waiters.len(), "queued behind running refresh");
                Ticket::Wait(Waiter(rx))
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of requests queued behind the running refresh.
    pub fn waiting(&self) -> usize {
        match &*self.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Return to idle, then complete the drained waiters in queue order.
    fn finish(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = match std::mem::replace(&mut *self.lock(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };
        let drained = waiters.len();
        for waiter in waiters {
            // A waiter whose request was dropped has nobody listening
            let _ = waiter.send(outcome.clone());
        }
        drained
    }

    // State updates never panic midway, so a poisoned lock still holds a
    // consistent value.
    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshLease<'_> {
    /// Publish the refresh outcome to every waiter and release the gate.
    ///
    /// Returns how many waiters were completed.
    pub fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.gate.finish(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let drained = self.gate.finish(&Err(Error::RefreshFailed(
                "token refresh was cancelled".into(),
            )));
            warn!(waiters = drained, "refresh abandoned before settling");
        }
    }
}

impl Waiter {
    /// Wait for the running refresh to settle.
    pub async fn outcome(self) -> RefreshOutcome {
        self.0.await.unwrap_or_else(|_| {
            Err(Error::RefreshFailed(
                "token refresh ended without an outcome".into(),
            ))
        })
    }
}
