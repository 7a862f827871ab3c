use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::document::{Document, DocumentId};

/// Where the service listens in a default local deployment.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081/documents";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot carry path segments: {0}")]
    CannotBeABase(Url),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl DocumentError {
    /// HTTP status for errors the service answered with.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DocumentError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    fn mime(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Stateless wrapper over the `/documents` collection.
#[derive(Clone)]
pub struct DocumentClient {
    http: Client,
    base_url: Url,
}

impl DocumentClient {
    pub fn with_base_url(base_url: &str) -> Result<Self, DocumentError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(DocumentError::CannotBeABase(base_url));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub async fn list(&self) -> Result<Vec<Document>, DocumentError> {
        let url = self.endpoint(&[])?;
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Document>, DocumentError> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut().append_pair("query", query);
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn get(&self, id: &DocumentId) -> Result<Document, DocumentError> {
        let url = self.endpoint(&[id.as_str()])?;
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn upload(&self, file: UploadFile) -> Result<Document, DocumentError> {
        let url = self.endpoint(&[])?;
        let mime = file.mime();
        let part = Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&mime)?;
        let form = Form::new().part("file", part);
        let response = self.http.post(url).multipart(form).send().await?;
        Self::handle_response(response).await
    }

    pub async fn rename(
        &self,
        id: &DocumentId,
        new_name: &str,
    ) -> Result<Document, DocumentError> {
        let mut url = self.endpoint(&[id.as_str()])?;
        url.query_pairs_mut().append_pair("newName", new_name);
        let response = self.http.patch(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn remove(&self, id: &DocumentId) -> Result<(), DocumentError> {
        let url = self.endpoint(&[id.as_str()])?;
        let response = self.http.delete(url).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    pub async fn fetch_binary(&self, id: &DocumentId) -> Result<DownloadedFile, DocumentError> {
        let url = self.endpoint(&[id.as_str(), "download"])?;
        let response = self.http.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename);
        let bytes = response.bytes().await?;
        Ok(DownloadedFile {
            filename,
            bytes: bytes.to_vec(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DocumentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DocumentError::CannotBeABase(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DocumentError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DocumentError::Api { status, body })
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DocumentError> {
        let response = Self::ensure_success(response).await?;
        response.json::<T>().await.map_err(DocumentError::Decode)
    }
}

fn disposition_filename(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}
