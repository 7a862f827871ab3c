use std::path::Path;
use std::sync::Arc;

use docsync_core::{DocumentId, UploadFile};

use super::engine::{PassOutcome, SyncEngine, SyncError};
use crate::intent::Intent;
use crate::sink::NotifyLevel;
use crate::view::DocumentRow;

/// Runs user intents against the document service.
///
/// Every action clears the busy indicator on all exit paths and turns
/// failures into a single notification. Successful mutations are followed by
/// one forced reconciliation through the engine's gate.
pub struct ActionController {
    engine: Arc<SyncEngine>,
}

impl ActionController {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    pub async fn dispatch(&self, intent: Intent) {
        match intent {
            Intent::Refresh => self.refresh().await,
            Intent::Search { query } => self.search(&query).await,
            Intent::Upload { path } => {
                let file = match path {
                    Some(path) => match read_upload(&path).await {
                        Ok(file) => Some(file),
                        Err(err) => {
                            tracing::warn!(path = %path.display(), "cannot read upload: {err}");
                            self.notify("Upload failed", NotifyLevel::Error);
                            return;
                        }
                    },
                    None => None,
                };
                self.upload(file).await;
            }
            Intent::Rename { id, new_name } => self.rename(&id, &new_name).await,
            Intent::Delete { id } => self.remove(&id).await,
            Intent::Download { id } => self.download(&id).await,
            Intent::ViewOcr { id } => self.view_ocr(&id).await,
        }
    }

    pub async fn refresh(&self) {
        let _busy = self.engine.busy();
        let outcome = self.engine.forced_pass().await;
        self.report_refresh(outcome);
    }

    /// An empty query lists every document.
    pub async fn search(&self, query: &str) {
        let _busy = self.engine.busy();
        self.engine.set_filter(query);
        match self.engine.forced_pass().await {
            Ok(result) => {
                if result.documents.is_empty() {
                    self.notify("No documents found", NotifyLevel::Info);
                }
            }
            Err(err) if matches!(*err, SyncError::Stopped) => {}
            Err(err) => {
                tracing::warn!(query = %query, "search failed: {err}");
                self.notify(&format!("Search failed: {err}"), NotifyLevel::Error);
                self.engine.render_empty();
            }
        }
    }

    /// `None` means no file was picked and is not an error.
    pub async fn upload(&self, file: Option<UploadFile>) {
        let Some(file) = file else {
            return;
        };
        let _busy = self.engine.busy();
        let filename = file.filename.clone();
        match self.engine.client().upload(file).await {
            Ok(doc) => {
                tracing::info!(id = %doc.id, filename = %doc.filename, "document uploaded");
                self.notify("Document uploaded successfully", NotifyLevel::Success);
                self.engine.set_filter("");
                let outcome = self.engine.forced_pass().await;
                self.report_refresh(outcome);
            }
            Err(err) => {
                tracing::warn!(filename = %filename, "upload failed: {err}");
                self.notify("Upload failed", NotifyLevel::Error);
            }
        }
    }

    pub async fn rename(&self, id: &DocumentId, new_name: &str) {
        let _busy = self.engine.busy();
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return;
        }
        if self
            .engine
            .rendered_row(id)
            .is_some_and(|row| row.filename == new_name)
        {
            return;
        }
        match self.engine.client().rename(id, new_name).await {
            Ok(doc) => {
                tracing::info!(id = %id, filename = %doc.filename, "document renamed");
                self.notify("Document renamed successfully", NotifyLevel::Success);
                let outcome = self.engine.forced_pass().await;
                self.report_refresh(outcome);
            }
            Err(err) => {
                tracing::warn!(id = %id, "rename failed: {err}");
                self.notify("Rename failed", NotifyLevel::Error);
            }
        }
    }

    pub async fn remove(&self, id: &DocumentId) {
        let label = self
            .engine
            .rendered_row(id)
            .map_or_else(|| id.to_string(), |row| row.filename);
        let prompt = format!("Are you sure you want to delete \"{label}\"?");
        if !self.engine.sink().confirm(&prompt).await {
            return;
        }
        let _busy = self.engine.busy();
        match self.engine.client().remove(id).await {
            Ok(()) => {
                tracing::info!(id = %id, "document deleted");
                self.notify("Document deleted successfully", NotifyLevel::Success);
                let outcome = self.engine.forced_pass().await;
                self.report_refresh(outcome);
            }
            Err(err) => {
                tracing::warn!(id = %id, "delete failed: {err}");
                self.notify("Delete failed", NotifyLevel::Error);
            }
        }
    }

    /// Saves the binary through the sink; tracked OCR state is not involved.
    pub async fn download(&self, id: &DocumentId) {
        let _busy = self.engine.busy();
        let known_name = self.engine.rendered_row(id).map(|row| row.filename);
        let file = match self.engine.client().fetch_binary(id).await {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(id = %id, "download failed: {err}");
                self.notify("Download failed", NotifyLevel::Error);
                return;
            }
        };
        let filename = known_name
            .or(file.filename)
            .unwrap_or_else(|| format!("document-{id}.pdf"));
        match self.engine.sink().save_download(&filename, &file.bytes) {
            Ok(saved) => {
                tracing::info!(id = %id, path = %saved.display(), "document saved");
                self.notify(&format!("Saved \"{filename}\""), NotifyLevel::Success);
            }
            Err(err) => {
                tracing::warn!(id = %id, "saving download failed: {err}");
                self.notify("Download failed", NotifyLevel::Error);
            }
        }
    }

    /// Uses the rendered row; ids outside the current view are looked up
    /// with a single-document fetch.
    pub async fn view_ocr(&self, id: &DocumentId) {
        let payload = match self.engine.rendered_row(id) {
            Some(row) => row.ocr,
            None => {
                let _busy = self.engine.busy();
                match self.engine.client().get(id).await {
                    Ok(doc) => DocumentRow::from_document(&doc).ocr,
                    Err(err) => {
                        tracing::warn!(id = %id, "cannot load document for OCR text: {err}");
                        None
                    }
                }
            }
        };
        match payload {
            Some(payload) => self.engine.sink().show_ocr_text(id, &payload),
            None => self.notify("No OCR text available", NotifyLevel::Info),
        }
    }

    fn report_refresh(&self, outcome: PassOutcome) {
        match outcome {
            Ok(_) => {}
            Err(err) if matches!(*err, SyncError::Stopped) => {}
            Err(err) => {
                tracing::warn!("reconciliation after action failed: {err}");
                self.notify("Failed to load documents", NotifyLevel::Error);
            }
        }
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        self.engine.sink().notify(message, level);
    }
}

async fn read_upload(path: &Path) -> std::io::Result<UploadFile> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(UploadFile::new(filename, bytes))
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
