//! Backend that serves recorded analysis responses.

use super::{AnalysisBackend, AnalysisResponse, DocumentLocation, PollResponse};
use crate::block::RawBlock;
use crate::error::{BackendError, ExtractError};
use crate::job::JobStatus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

const REPLAY_JOB_ID: &str = "replay-job";

/// Replays recorded result pages.
///
/// * `analyze_sync` returns every page concatenated.
/// * `submit_async_job` returns a fixed job id; the job reports
///   `IN_PROGRESS` for the configured number of probes, then `SUCCEEDED`
///   with page 1, chaining the rest through continuation tokens.
/// * `detect_text` returns only the PAGE, LINE and WORD blocks.
/// * `fetch_document` serves bytes registered with
///   [`with_document`](Self::with_document).
#[derive(Debug)]
pub struct ReplayBackend {
    pages: Vec<Vec<RawBlock>>,
    documents: HashMap<String, Vec<u8>>,
    in_progress_probes: u32,
    probes: AtomicU32,
}

impl ReplayBackend {
    pub fn new(pages: Vec<Vec<RawBlock>>) -> Self {
        Self {
            pages,
            documents: HashMap::new(),
            in_progress_probes: 0,
            probes: AtomicU32::new(0),
        }
    }

    /// Report `IN_PROGRESS` for the first `n` status probes.
    pub fn with_in_progress_probes(mut self, n: u32) -> Self {
        self.in_progress_probes = n;
        self
    }

    /// Serve `bytes` as the stored object at `location`.
    pub fn with_document(mut self, location: &DocumentLocation, bytes: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(location.to_string(), bytes.into());
        self
    }

    /// Load one page per file. Each file holds an analysis response object
    /// (`{"Blocks": [...]}`) or a bare block array; order is preserved.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ExtractError> {
        let mut pages = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let body = std::fs::read(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractError::FileNotFound {
                    path: path.to_path_buf(),
                },
                std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied {
                    path: path.to_path_buf(),
                },
                _ => ExtractError::Internal(format!("reading {}: {e}", path.display())),
            })?;
            let resp = AnalysisResponse::from_json(&body).map_err(|e| ExtractError::InvalidInput {
                input: path.display().to_string(),
                reason: e.to_string(),
            })?;
            debug!("Loaded {} blocks from {}", resp.blocks.len(), path.display());
            pages.push(resp.blocks);
        }
        Ok(Self::new(pages))
    }

    /// Status probes answered so far (page fetches excluded).
    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    fn page(&self, index: usize) -> PollResponse {
        let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        PollResponse {
            status: JobStatus::Succeeded,
            status_message: None,
            blocks: self.pages.get(index).cloned().unwrap_or_default(),
            next_token,
        }
    }
}

#[async_trait]
impl AnalysisBackend for ReplayBackend {
    fn name(&self) -> &str {
        "replay"
    }

    async fn analyze_sync(&self, _document: &[u8]) -> Result<Vec<RawBlock>, BackendError> {
        Ok(self.pages.concat())
    }

    async fn submit_async_job(&self, location: &DocumentLocation) -> Result<String, BackendError> {
        debug!("Replay job submitted for {}", location);
        Ok(REPLAY_JOB_ID.to_string())
    }

    async fn poll_async_job(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<PollResponse, BackendError> {
        if job_id != REPLAY_JOB_ID {
            return Err(BackendError::Rejected {
                code: "InvalidJobIdException".into(),
                message: format!("unknown job '{job_id}'"),
            });
        }

        match next_token {
            None => {
                let probe = self.probes.fetch_add(1, Ordering::SeqCst);
                if probe < self.in_progress_probes {
                    Ok(PollResponse {
                        status: JobStatus::InProgress,
                        ..Default::default()
                    })
                } else {
                    Ok(self.page(0))
                }
            }
            Some(token) => {
                let index: usize = token.parse().map_err(|_| BackendError::Rejected {
                    code: "InvalidParameterException".into(),
                    message: format!("bad continuation token '{token}'"),
                })?;
                if index >= self.pages.len() {
                    return Err(BackendError::Rejected {
                        code: "InvalidParameterException".into(),
                        message: format!("continuation token '{token}' is past the last page"),
                    });
                }
                Ok(self.page(index))
            }
        }
    }

    async fn fetch_document(&self, location: &DocumentLocation) -> Result<Vec<u8>, BackendError> {
        self.documents
            .get(&location.to_string())
            .cloned()
            .ok_or_else(|| BackendError::Rejected {
                code: "NoSuchKey".into(),
                message: format!("no stored object at {location}"),
            })
    }

    async fn detect_text(&self, _document: &[u8]) -> Result<Vec<RawBlock>, BackendError> {
        Ok(self
            .pages
            .iter()
            .flatten()
            .filter(|b| matches!(b.block_type.as_str(), "PAGE" | "LINE" | "WORD"))
            .cloned()
            .collect())
    }
}
