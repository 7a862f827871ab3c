use std::collections::{BTreeSet, HashMap};

use docsync_core::{Document, DocumentId};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub documents: Vec<Document>,
    /// Ids whose OCR job finished since the previous pass, ascending.
    pub completed: Vec<DocumentId>,
}

impl ReconciliationResult {
    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|doc| &doc.id == id)
    }
}

/// Last observed OCR flag per document id.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<DocumentId, bool>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(&mut self, documents: Vec<Document>) -> ReconciliationResult {
        let completed: BTreeSet<DocumentId> = documents
            .iter()
            .filter(|doc| doc.ocr_job_done)
            .filter(|doc| !self.states.get(&doc.id).copied().unwrap_or(false))
            .map(|doc| doc.id.clone())
            .collect();

        self.states = documents
            .iter()
            .map(|doc| (doc.id.clone(), doc.ocr_job_done))
            .collect();

        ReconciliationResult {
            documents,
            completed: completed.into_iter().collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn observed(&self, id: &DocumentId) -> Option<bool> {
        self.states.get(id).copied()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
