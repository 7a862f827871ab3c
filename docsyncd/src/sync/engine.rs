use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use docsync_core::{DocumentClient, DocumentError, DocumentId};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
use super::gate::Phase;
use super::gate::SyncGate;
use super::tracker::{ReconciliationResult, StateTracker};
use crate::sink::{BusyGuard, BusyIndicator, NotifyLevel, PresentationSink};
use crate::view::{DocumentRow, build_rows};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] DocumentError),
    #[error("session stopped")]
    Stopped,
    #[error("queued reconciliation was abandoned")]
    Abandoned,
}

/// Shared between every requester that waited on the same pass.
pub type PassOutcome = Result<ReconciliationResult, Arc<SyncError>>;

/// Fetch, diff and publish pipeline behind the [`SyncGate`].
pub struct SyncEngine {
    client: DocumentClient,
    sink: Arc<dyn PresentationSink>,
    busy: BusyIndicator,
    gate: SyncGate,
    tracker: Mutex<StateTracker>,
    filter: Mutex<String>,
    rendered: Mutex<Vec<DocumentRow>>,
    session: CancellationToken,
}

impl SyncEngine {
    pub fn new(client: DocumentClient, sink: Arc<dyn PresentationSink>) -> Self {
        Self {
            client,
            busy: BusyIndicator::new(Arc::clone(&sink)),
            sink,
            gate: SyncGate::new(),
            tracker: Mutex::new(StateTracker::new()),
            filter: Mutex::new(String::new()),
            rendered: Mutex::new(Vec::new()),
            session: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &DocumentClient {
        &self.client
    }

    pub fn sink(&self) -> &dyn PresentationSink {
        self.sink.as_ref()
    }

    pub fn busy(&self) -> BusyGuard {
        self.busy.acquire()
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.gate.phase()
    }

    pub fn session(&self) -> CancellationToken {
        self.session.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.session.is_cancelled()
    }

    /// Ends the session; outstanding fetches finish but are not published.
    pub fn shutdown(&self) {
        self.session.cancel();
    }

    pub fn active_filter(&self) -> String {
        lock(&self.filter).clone()
    }

    pub fn set_filter(&self, query: &str) {
        *lock(&self.filter) = query.trim().to_string();
    }

    pub fn rendered_row(&self, id: &DocumentId) -> Option<DocumentRow> {
        lock(&self.rendered).iter().find(|row| &row.id == id).cloned()
    }

    #[cfg(test)]
    pub(crate) fn rendered_rows(&self) -> Vec<DocumentRow> {
        lock(&self.rendered).clone()
    }

    /// Clears the view without touching tracked OCR state.
    pub fn render_empty(&self) {
        lock(&self.rendered).clear();
        self.sink.render(&[]);
    }

    /// Timer entry point; `None` when the tick was dropped.
    pub async fn periodic_pass(&self) -> Option<PassOutcome> {
        let outcome = self.gate.try_run(|| self.pass()).await;
        if outcome.is_none() {
            tracing::debug!("reconciliation in flight, dropping tick");
        }
        outcome
    }

    /// Action entry point; never dropped, queued behind an outstanding pass.
    pub async fn forced_pass(&self) -> PassOutcome {
        self.gate.run_forced(|| self.pass()).await
    }

    async fn pass(&self) -> PassOutcome {
        if self.is_stopped() {
            return Err(Arc::new(SyncError::Stopped));
        }
        let _busy = self.busy();
        let query = self.active_filter();
        tracing::debug!(query = %query, "reconciliation fetch");
        let fetched = if query.is_empty() {
            self.client.list().await
        } else {
            self.client.search(&query).await
        };
        if self.is_stopped() {
            tracing::debug!("session stopped, discarding fetched list");
            return Err(Arc::new(SyncError::Stopped));
        }
        let documents = fetched.map_err(|err| Arc::new(SyncError::from(err)))?;

        let result = lock(&self.tracker).reconcile(documents);
        self.publish(&result);
        Ok(result)
    }

    fn publish(&self, result: &ReconciliationResult) {
        let rows = build_rows(&result.documents);
        self.sink.render(&rows);
        *lock(&self.rendered) = rows;

        for id in &result.completed {
            let Some(doc) = result.document(id) else {
                continue;
            };
            tracing::info!(id = %id, filename = %doc.filename, "ocr completed");
            self.sink.notify(
                &format!("OCR completed for \"{}\"", doc.filename),
                NotifyLevel::Success,
            );
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
