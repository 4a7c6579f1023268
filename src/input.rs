//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! Three shapes are accepted:
//!
//! * a local path, read into memory;
//! * an `http://` / `https://` URL, downloaded with reqwest;
//! * an `s3://` or S3 HTTPS URL, which is *not* fetched. The resulting
//!   document carries only a [`DocumentLocation`]; the backend reads the
//!   object itself when the asynchronous path runs.

use crate::backend::DocumentLocation;
use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Classification hint that picks the extraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentClass {
    /// Read directly; no backend call.
    PlainText,
    /// Analysed in one synchronous call.
    SinglePageImage,
    /// Analysed by an asynchronous job.
    MultiPageContainer,
    Unrecognized,
}

impl DocumentClass {
    /// Classify by file extension, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("txt") => DocumentClass::PlainText,
            Some("jpg" | "jpeg" | "png" | "tif" | "tiff" | "bmp") => DocumentClass::SinglePageImage,
            Some("pdf") => DocumentClass::MultiPageContainer,
            _ => DocumentClass::Unrecognized,
        }
    }

    /// Parse a CLI spelling: `text`, `image`, `container` or `other`.
    pub fn parse_hint(hint: &str) -> Option<Self> {
        match hint.to_ascii_lowercase().as_str() {
            "text" | "plain-text" | "txt" => Some(DocumentClass::PlainText),
            "image" | "single-page-image" => Some(DocumentClass::SinglePageImage),
            "container" | "multi-page-container" | "pdf" => Some(DocumentClass::MultiPageContainer),
            "other" | "unrecognized" => Some(DocumentClass::Unrecognized),
            _ => None,
        }
    }
}

/// One input to extract.
#[derive(Debug, Clone)]
pub struct Document {
    /// Display name, usually the file name.
    pub name: String,
    /// Document content. Empty for storage-only documents.
    pub bytes: Vec<u8>,
    pub class: DocumentClass,
    /// Where the backend can read the document for asynchronous analysis.
    pub location: Option<DocumentLocation>,
}

impl Document {
    /// An in-memory document, classified by `name`.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        Self {
            class: DocumentClass::from_name(&name),
            name,
            bytes: bytes.into(),
            location: None,
        }
    }

    /// A document held in storage, classified by its key.
    pub fn at(location: DocumentLocation) -> Self {
        let name = location.file_name().to_string();
        Self {
            class: DocumentClass::from_name(&name),
            name,
            bytes: Vec::new(),
            location: Some(location),
        }
    }

    pub fn with_class(mut self, class: DocumentClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_location(mut self, location: DocumentLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn has_content(&self) -> bool {
        !self.bytes.is_empty()
    }
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a [`Document`].
///
/// S3 URLs are checked first, so an S3 HTTPS URL becomes a location rather
/// than a download.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, ExtractError> {
    if DocumentLocation::is_s3_url(input) {
        let location = DocumentLocation::parse(input)?;
        debug!("Resolved storage location: {}", location);
        Ok(Document::at(location))
    } else if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Document, ExtractError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied { path: path.clone() },
        _ => ExtractError::FileNotFound { path: path.clone() },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(Document::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, ExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(Document::new(filename_from_url(url), bytes.to_vec()))
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded".to_string())
}
