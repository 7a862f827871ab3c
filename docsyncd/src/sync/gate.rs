use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, watch};

use super::engine::{PassOutcome, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
}

#[derive(Debug)]
struct GateState {
    phase: Phase,
    // Present while a forced pass waits for the outstanding one.
    queued: Option<watch::Receiver<Option<PassOutcome>>>,
}

/// Admits at most one reconciliation pass at a time.
///
/// Periodic passes are dropped when the gate is busy. Forced passes wait
/// for the outstanding pass and then run; a forced request arriving while
/// another is already queued shares that queued pass and its outcome.
#[derive(Debug)]
pub struct SyncGate {
    state: Mutex<GateState>,
    released: Notify,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                phase: Phase::Idle,
                queued: None,
            }),
            released: Notify::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.lock().phase
    }

    #[cfg(test)]
    pub(crate) fn has_queued(&self) -> bool {
        self.lock().queued.is_some()
    }

    /// Runs `pass` only if nothing is in flight or queued.
    pub async fn try_run<F, Fut>(&self, pass: F) -> Option<PassOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PassOutcome>,
    {
        {
            let mut state = self.lock();
            if state.phase != Phase::Idle || state.queued.is_some() {
                return None;
            }
            state.phase = Phase::Fetching;
        }
        let _held = Held(self);
        Some(pass().await)
    }

    /// Runs `pass` now, or right after the outstanding pass finishes.
    pub async fn run_forced<F, Fut>(&self, pass: F) -> PassOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PassOutcome>,
    {
        let role = {
            let mut state = self.lock();
            if let Some(queued) = &state.queued {
                Role::Follow(queued.clone())
            } else if state.phase == Phase::Idle {
                state.phase = Phase::Fetching;
                Role::Run
            } else {
                let (tx, rx) = watch::channel(None);
                state.queued = Some(rx);
                Role::Lead(tx)
            }
        };

        match role {
            Role::Run => {
                let _held = Held(self);
                pass().await
            }
            Role::Lead(tx) => {
                let held = self.acquire_queued(&tx).await;
                let outcome = pass().await;
                drop(held);
                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
            Role::Follow(mut rx) => match rx.wait_for(Option::is_some).await {
                Ok(outcome) => outcome.clone().unwrap_or_else(abandoned),
                Err(_) => abandoned(),
            },
        }
    }

    async fn acquire_queued<'a>(&'a self, tx: &'a watch::Sender<Option<PassOutcome>>) -> Held<'a> {
        let mut waiting = Waiting {
            gate: self,
            tx,
            promoted: false,
        };
        loop {
            let released = self.released.notified();
            {
                let mut state = self.lock();
                if state.phase == Phase::Idle {
                    state.phase = Phase::Fetching;
                    state.queued = None;
                    waiting.promoted = true;
                    return Held(self);
                }
            }
            released.await;
        }
    }

    fn release(&self) {
        self.lock().phase = Phase::Idle;
        self.released.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Role {
    Run,
    Lead(watch::Sender<Option<PassOutcome>>),
    Follow(watch::Receiver<Option<PassOutcome>>),
}

fn abandoned() -> PassOutcome {
    Err(Arc::new(SyncError::Abandoned))
}

// Returns the gate to idle even if the pass future is dropped mid-flight.
struct Held<'a>(&'a SyncGate);

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

// Clears the queue slot if a queued leader is dropped before it gets the gate.
struct Waiting<'a> {
    gate: &'a SyncGate,
    tx: &'a watch::Sender<Option<PassOutcome>>,
    promoted: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        let mut state = self.gate.lock();
        if state
            .queued
            .as_ref()
            .is_some_and(|rx| rx.same_channel(&self.tx.subscribe()))
        {
            state.queued = None;
        }
    }
}
