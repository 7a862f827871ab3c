use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Opaque identifier assigned by the document service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filesize: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filetype: String,
    #[serde(with = "upload_date")]
    pub upload_date: OffsetDateTime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ocr_job_done: bool,
    #[serde(default)]
    pub ocr_text: Option<String>,
}

impl Document {
    /// OCR text, only once the OCR job has finished.
    pub fn completed_ocr_text(&self) -> Option<&str> {
        if self.ocr_job_done {
            self.ocr_text.as_deref()
        } else {
            None
        }
    }
}

// Content type and size are not always known to the service and come back as null.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The service emits naive local date-times that are UTC by contract.
mod upload_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::{Iso8601, Rfc3339};
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
        if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(parsed);
        }
        PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn naive_upload_date_is_read_as_utc() {
        let parsed = upload_date::parse("2024-05-01T10:15:30").unwrap();
        assert_eq!(parsed, datetime!(2024-05-01 10:15:30 UTC));
    }

    #[test]
    fn explicit_offset_is_honoured() {
        let parsed = upload_date::parse("2024-05-01T12:15:30+02:00").unwrap();
        assert_eq!(parsed, datetime!(2024-05-01 10:15:30 UTC));
    }

    #[test]
    fn ocr_text_is_hidden_until_job_is_done() {
        let mut doc = Document {
            id: DocumentId::from("a"),
            filename: "x.pdf".into(),
            filesize: 1,
            filetype: "application/pdf".into(),
            upload_date: datetime!(2024-05-01 10:15:30 UTC),
            ocr_job_done: false,
            ocr_text: Some("draft".into()),
        };
        assert_eq!(doc.completed_ocr_text(), None);
        doc.ocr_job_done = true;
        assert_eq!(doc.completed_ocr_text(), Some("draft"));
    }

    #[test]
    fn null_metadata_reads_as_empty() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "id": "b",
            "filename": null,
            "filesize": null,
            "filetype": null,
            "uploadDate": "2024-05-01T10:15:30",
            "ocrJobDone": null,
            "ocrText": null
        }))
        .unwrap();
        assert_eq!(doc.filename, "");
        assert_eq!(doc.filesize, 0);
        assert_eq!(doc.filetype, "");
        assert!(!doc.ocr_job_done);
    }
}
