use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docsync_core::DocumentId;
use serde_json::json;
use tokio::sync::Notify;

use crate::sink::{NotifyLevel, PresentationSink};
use crate::view::{DocumentRow, OcrPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Rendered(Vec<DocumentRow>),
    Notified(String, NotifyLevel),
    OcrShown(DocumentId, OcrPayload),
    Saved(String, Vec<u8>),
    Busy(bool),
    Confirm(String),
}

pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    changed: Notify,
    confirm_answer: AtomicBool,
    fail_saves: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            changed: Notify::new(),
            confirm_answer: AtomicBool::new(true),
            fail_saves: AtomicBool::new(false),
        }
    }
}

impl RecordingSink {
    pub fn answer_confirm(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(String, NotifyLevel)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Notified(message, level) => Some((message, level)),
                _ => None,
            })
            .collect()
    }

    pub fn renders(&self) -> Vec<Vec<DocumentRow>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Rendered(rows) => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn last_render(&self) -> Option<Vec<DocumentRow>> {
        self.renders().pop()
    }

    pub async fn wait_for_renders(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let changed = self.changed.notified();
                if self.renders().len() >= count {
                    return;
                }
                changed.await;
            }
        })
        .await
        .expect("timed out waiting for renders");
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl PresentationSink for RecordingSink {
    fn render(&self, rows: &[DocumentRow]) {
        self.push(SinkEvent::Rendered(rows.to_vec()));
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        self.push(SinkEvent::Notified(message.to_string(), level));
    }

    fn show_ocr_text(&self, id: &DocumentId, payload: &OcrPayload) {
        self.push(SinkEvent::OcrShown(id.clone(), payload.clone()));
    }

    fn save_download(&self, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full"));
        }
        self.push(SinkEvent::Saved(filename.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(filename))
    }

    fn set_busy(&self, busy: bool) {
        self.push(SinkEvent::Busy(busy));
    }

    async fn confirm(&self, prompt: &str) -> bool {
        self.push(SinkEvent::Confirm(prompt.to_string()));
        self.confirm_answer.load(Ordering::SeqCst)
    }
}

pub fn document_json(id: &str, filename: &str, done: bool) -> serde_json::Value {
    let text = done.then_some("hello");
    json!({
        "id": id,
        "filename": filename,
        "filesize": 1024,
        "filetype": "application/pdf",
        "uploadDate": "2024-05-01T10:15:30",
        "ocrJobDone": done,
        "ocrText": text
    })
}
