use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{SyncEngine, SyncError};
use crate::sink::NotifyLevel;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// Owns the periodic refresh timer of one session.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Starts the timer; the first pass runs immediately.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        if self.engine.is_stopped() {
            tracing::warn!("session already stopped, not starting refresh timer");
            return;
        }
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "refresh timer started");
        let engine = Arc::clone(&self.engine);
        let interval = self.interval;
        self.handle = Some(tokio::spawn(run_timer(engine, interval)));
    }

    /// Cancels the timer and ends the session. The returned handle resolves
    /// once an in-flight pass has completed and been discarded.
    pub fn stop(&mut self) -> Option<JoinHandle<()>> {
        self.engine.shutdown();
        let handle = self.handle.take();
        if handle.is_some() {
            tracing::info!("refresh timer stopped");
        }
        handle
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}

async fn run_timer(engine: Arc<SyncEngine>, interval: Duration) {
    let session = engine.session();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = session.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match engine.periodic_pass().await {
            None => {}
            Some(Ok(result)) => {
                tracing::debug!(
                    documents = result.documents.len(),
                    completed = result.completed.len(),
                    "periodic reconciliation done"
                );
            }
            Some(Err(err)) if matches!(*err, SyncError::Stopped) => break,
            Some(Err(err)) => {
                tracing::warn!("periodic reconciliation failed: {err}");
                engine
                    .sink()
                    .notify("Failed to load documents", NotifyLevel::Error);
            }
        }
    }
}
