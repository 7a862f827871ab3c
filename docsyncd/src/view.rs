use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use docsync_core::{Document, DocumentId};
use thiserror::Error;
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrStatus {
    Pending,
    Complete,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// OCR text carried to the sink as base64 of its NFC-normalized UTF-8 bytes.
///
/// OCR text comes from scanned documents of unknown origin; it is only ever
/// handed over in this encoded form and decoded once by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPayload(String);

impl OcrPayload {
    pub fn encode(text: &str) -> Self {
        let normalized: String = text.nfc().collect();
        Self(STANDARD.encode(normalized.as_bytes()))
    }

    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    #[cfg(test)]
    pub(crate) fn as_encoded(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<String, PayloadError> {
        let bytes = STANDARD.decode(self.0.as_bytes())?;
        Ok(String::from_utf8(bytes)?.nfc().collect())
    }
}

/// One line of the rendered document list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub id: DocumentId,
    pub filename: String,
    pub size: String,
    pub filetype: String,
    pub uploaded: OffsetDateTime,
    pub status: OcrStatus,
    pub ocr: Option<OcrPayload>,
}

impl DocumentRow {
    pub fn from_document(doc: &Document) -> Self {
        let ocr = doc
            .completed_ocr_text()
            .filter(|text| !text.is_empty())
            .map(OcrPayload::encode);
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            size: format_file_size(doc.filesize),
            filetype: doc.filetype.clone(),
            uploaded: doc.upload_date,
            status: if doc.ocr_job_done {
                OcrStatus::Complete
            } else {
                OcrStatus::Pending
            },
            ocr,
        }
    }
}

pub fn build_rows(documents: &[Document]) -> Vec<DocumentRow> {
    documents.iter().map(DocumentRow::from_document).collect()
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn doc(done: bool, text: Option<&str>) -> Document {
        Document {
            id: DocumentId::from("a"),
            filename: "x.pdf".into(),
            filesize: 1536,
            filetype: "application/pdf".into(),
            upload_date: datetime!(2024-05-01 10:00 UTC),
            ocr_job_done: done,
            ocr_text: text.map(str::to_string),
        }
    }

    #[test]
    fn file_sizes_use_binary_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3072.0 GB");
    }

    #[test]
    fn payload_carries_markup_and_multibyte_text_unchanged() {
        let text = "<script>alert('x')</script>\nÄrger – 日本語";
        let payload = OcrPayload::encode(text);
        assert!(!payload.as_encoded().contains('<'));
        assert_eq!(payload.decode().unwrap(), text);
    }

    #[test]
    fn payload_text_is_nfc_normalized() {
        let decomposed = "Cafe\u{301} A\u{30a}";
        let payload = OcrPayload::encode(decomposed);
        assert_eq!(payload.decode().unwrap(), "Caf\u{e9} \u{c5}");

        let foreign = OcrPayload::from_encoded(STANDARD.encode("e\u{301}"));
        assert_eq!(foreign.decode().unwrap(), "\u{e9}");
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(matches!(
            OcrPayload::from_encoded("%%%").decode(),
            Err(PayloadError::Base64(_))
        ));
        assert!(matches!(
            OcrPayload::from_encoded("/w==").decode(),
            Err(PayloadError::Utf8(_))
        ));
    }

    #[test]
    fn row_exposes_ocr_only_when_done_and_non_empty() {
        assert_eq!(DocumentRow::from_document(&doc(false, Some("t"))).ocr, None);
        assert_eq!(DocumentRow::from_document(&doc(true, Some(""))).ocr, None);

        let row = DocumentRow::from_document(&doc(true, Some("hello")));
        assert_eq!(row.status, OcrStatus::Complete);
        assert_eq!(row.size, "1.5 KB");
        assert_eq!(row.ocr.unwrap().decode().unwrap(), "hello");
    }
}
