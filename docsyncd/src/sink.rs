use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use docsync_core::DocumentId;

use crate::view::{DocumentRow, OcrPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Success,
    Error,
    Info,
}

/// Where the engine sends everything the user sees.
///
/// The engine calls the sink; the sink never calls back into the engine.
/// User input reaches the engine as [`crate::intent::Intent`] values instead.
#[async_trait]
pub trait PresentationSink: Send + Sync {
    fn render(&self, rows: &[DocumentRow]);

    fn notify(&self, message: &str, level: NotifyLevel);

    /// The payload must be decoded by the sink and shown as plain text.
    fn show_ocr_text(&self, id: &DocumentId, payload: &OcrPayload);

    fn save_download(&self, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf>;

    fn set_busy(&self, busy: bool);

    async fn confirm(&self, prompt: &str) -> bool;
}

/// Depth-counted busy flag; the sink sees one `true` and one `false` per
/// stretch of overlapping work.
#[derive(Clone)]
pub struct BusyIndicator {
    sink: Arc<dyn PresentationSink>,
    depth: Arc<Mutex<usize>>,
}

impl BusyIndicator {
    pub fn new(sink: Arc<dyn PresentationSink>) -> Self {
        Self {
            sink,
            depth: Arc::new(Mutex::new(0)),
        }
    }

    pub fn acquire(&self) -> BusyGuard {
        let mut depth = self.depth.lock().unwrap_or_else(PoisonError::into_inner);
        *depth += 1;
        if *depth == 1 {
            self.sink.set_busy(true);
        }
        BusyGuard {
            indicator: self.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        *self.depth.lock().unwrap_or_else(PoisonError::into_inner) > 0
    }
}

#[must_use = "the busy indicator is cleared when the guard is dropped"]
pub struct BusyGuard {
    indicator: BusyIndicator,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut depth = self
            .indicator
            .depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *depth = depth.saturating_sub(1);
        if *depth == 0 {
            self.indicator.sink.set_busy(false);
        }
    }
}
