mod client;
mod document;

pub use client::{DEFAULT_BASE_URL, DocumentClient, DocumentError, DownloadedFile, UploadFile};
pub use document::{Document, DocumentId};
