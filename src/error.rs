//! Error types for the blockgraph library.
//!
//! Three error types reflect three distinct layers:
//!
//! * [`ExtractError`]: **Fatal.** The extraction cannot produce a result
//!   (job failed, polling budget exhausted, unsupported input, malformed
//!   block graph). Returned as `Err(ExtractError)` from every public entry
//!   point. Variants carry the job id, last status and attempt count so the
//!   caller can log them; the library never logs an error it returns.
//!
//! * [`BackendError`]: a single backend call failed. Throttling is the one
//!   kind the job executor recovers from locally; every other kind is
//!   wrapped into [`ExtractError::Backend`].
//!
//! * [`BlockError`]: ingestion found a block collection whose shape is
//!   invalid (missing or duplicate ids, selection marks without a status).
//!   Surfaced as [`ExtractError::Parse`].

use crate::job::JobStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the blockgraph library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Block graph errors ────────────────────────────────────────────────
    /// The backend returned a block collection that cannot be ingested.
    #[error("Malformed block graph: {0}")]
    Parse(#[from] BlockError),

    // ── Job errors ────────────────────────────────────────────────────────
    /// The asynchronous job reached the terminal `FAILED` status.
    #[error("Analysis job '{job_id}' failed after {attempts} probes: {status_message}")]
    BackendFailure {
        job_id: String,
        status_message: String,
        attempts: u32,
    },

    /// The polling budget was exhausted while the job was still running.
    #[error("Analysis job '{job_id}' timed out after {attempts} probes (last status: {last_status})")]
    BackendTimeout {
        job_id: String,
        attempts: u32,
        last_status: JobStatus,
    },

    /// A backend call failed with a non-throttling error, or kept being
    /// throttled past the retry budget.
    #[error("Backend call '{operation}' failed{}: {source}", job_suffix(.job_id))]
    Backend {
        operation: &'static str,
        job_id: Option<String>,
        #[source]
        source: BackendError,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// No extraction path applies and fallback analysis also failed.
    #[error("Unsupported document format for '{name}': {reason}")]
    UnsupportedFormat { name: String, reason: String },

    /// The asynchronous path needs a storage location the backend can read.
    #[error("Document '{name}' needs a storage location for asynchronous analysis\nPass --location s3://bucket/key.")]
    MissingLocation { name: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a file path, HTTP(S) URL or S3 URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn job_suffix(job_id: &Option<String>) -> String {
    match job_id {
        Some(id) => format!(" for job '{id}'"),
        None => String::new(),
    }
}

/// Failure of a single backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transient rejection; the caller should retry after a delay.
    #[error("request throttled: {0}")]
    Throttled(String),

    /// The backend refused the request (bad document, access denied, …).
    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// Network or transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a body that does not decode.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend does not implement this operation.
    #[error("operation not supported by this backend")]
    Unsupported,
}

impl BackendError {
    /// Whether the executor should back off and retry this call.
    pub fn is_throttling(&self) -> bool {
        matches!(self, BackendError::Throttled(_))
    }
}

/// An invalid block collection, found once at ingestion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockError {
    /// A block has no id (or an empty one).
    #[error("block #{position} has no Id")]
    MissingId { position: usize },

    /// Two blocks in one collection share an id.
    #[error("duplicate block Id '{id}'")]
    DuplicateId { id: String },

    /// A field required by the block's type is absent.
    #[error("block '{id}' is missing required field {field}")]
    MissingField { id: String, field: &'static str },

    /// A field holds a value outside its closed set.
    #[error("block '{id}' has invalid {field} '{value}'")]
    InvalidField {
        id: String,
        field: &'static str,
        value: String,
    },

    /// The response body is not valid JSON of the expected shape.
    #[error("invalid analysis JSON: {0}")]
    Json(String),
}
