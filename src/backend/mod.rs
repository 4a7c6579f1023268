//! The document-analysis backend seen from the core.
//!
//! The core never talks to a concrete service. Everything it needs is the
//! [`AnalysisBackend`] trait: one synchronous analysis call for small
//! inputs, a submit/poll pair for asynchronous jobs whose results are
//! paginated by an opaque continuation token, and a read of a stored
//! document's bytes.
//!
//! Two adapters ship with the crate:
//!
//! * [`ReplayBackend`] serves recorded analysis responses from memory or
//!   disk. Useful offline, in tests, and for re-running reconstruction over
//!   saved backend output.
//! * [`HttpBackend`] speaks JSON over HTTP to a gateway using the
//!   Textract response shape.
//!
//! Backends return raw blocks; validation happens once in
//! [`crate::block::ingest`] after all pages have been gathered.

mod http;
mod location;
mod replay;

pub use http::HttpBackend;
pub use location::DocumentLocation;
pub use replay::ReplayBackend;

use crate::block::RawBlock;
use crate::error::BackendError;
use crate::job::JobStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A document-analysis service.
///
/// Implementations must be `Send + Sync` so one backend can serve several
/// concurrent jobs. A transient rejection must be reported as
/// [`BackendError::Throttled`]; the executor backs off and retries only
/// that kind.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Analyse a small single-page document in one blocking call.
    async fn analyze_sync(&self, document: &[u8]) -> Result<Vec<RawBlock>, BackendError>;

    /// Start an asynchronous analysis of a stored document; returns the job id.
    async fn submit_async_job(&self, location: &DocumentLocation) -> Result<String, BackendError>;

    /// Probe a job, or fetch the page named by `next_token`.
    async fn poll_async_job(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<PollResponse, BackendError>;

    /// Read a stored document's bytes.
    ///
    /// Backends that cannot read storage keep the default; the facade then
    /// leaves stored images to an asynchronous job.
    async fn fetch_document(&self, location: &DocumentLocation) -> Result<Vec<u8>, BackendError> {
        let _ = location;
        Err(BackendError::Unsupported)
    }

    /// Text-only detection (LINE/WORD blocks), used as a last-resort path
    /// for documents no analysis path recognises.
    async fn detect_text(&self, document: &[u8]) -> Result<Vec<RawBlock>, BackendError> {
        let _ = document;
        Err(BackendError::Unsupported)
    }
}

/// One answer to [`AnalysisBackend::poll_async_job`].
#[derive(Debug, Clone, Default)]
pub struct PollResponse {
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub blocks: Vec<RawBlock>,
    pub next_token: Option<String>,
}

/// An analysis response exactly as the backend serialises it.
///
/// Synchronous responses carry only `Blocks`; job responses also carry
/// `JobStatus` and, while more pages remain, `NextToken`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl AnalysisResponse {
    /// Decode a response body. A bare JSON array is read as the block list.
    pub fn from_json(body: &[u8]) -> Result<Self, BackendError> {
        match serde_json::from_slice::<AnalysisResponse>(body) {
            Ok(resp) => Ok(resp),
            Err(object_err) => serde_json::from_slice::<Vec<RawBlock>>(body)
                .map(|blocks| AnalysisResponse {
                    blocks,
                    ..Default::default()
                })
                .map_err(|_| BackendError::Malformed(object_err.to_string())),
        }
    }

    /// Convert a job response; `JobStatus` is mandatory here.
    pub fn into_poll(self) -> Result<PollResponse, BackendError> {
        let status = self
            .job_status
            .ok_or_else(|| BackendError::Malformed("job response without JobStatus".into()))?;
        Ok(PollResponse {
            status,
            status_message: self.status_message,
            blocks: self.blocks,
            next_token: self.next_token.filter(|t| !t.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_job_response() {
        let body = br#"{"JobStatus": "SUCCEEDED", "NextToken": "abc",
                        "Blocks": [{"Id": "1", "BlockType": "LINE", "Text": "hi"}]}"#;
        let poll = AnalysisResponse::from_json(body).unwrap().into_poll().unwrap();
        assert_eq!(poll.status, JobStatus::Succeeded);
        assert_eq!(poll.next_token.as_deref(), Some("abc"));
        assert_eq!(poll.blocks.len(), 1);
    }

    #[test]
    fn decodes_bare_block_array() {
        let body = br#"[{"Id": "1", "BlockType": "WORD", "Text": "x"}]"#;
        let resp = AnalysisResponse::from_json(body).unwrap();
        assert_eq!(resp.blocks.len(), 1);
        assert!(resp.job_status.is_none());
    }

    #[test]
    fn empty_next_token_means_last_page() {
        let body = br#"{"JobStatus": "SUCCEEDED", "NextToken": "", "Blocks": []}"#;
        let poll = AnalysisResponse::from_json(body).unwrap().into_poll().unwrap();
        assert!(poll.next_token.is_none());
    }

    #[test]
    fn job_response_needs_status() {
        let resp = AnalysisResponse::from_json(br#"{"Blocks": []}"#).unwrap();
        assert!(matches!(resp.into_poll(), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            AnalysisResponse::from_json(b"<html>"),
            Err(BackendError::Malformed(_))
        ));
    }
}
