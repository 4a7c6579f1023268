//! Job execution: the synchronous call and the submit-then-poll state machine.
//!
//! ```text
//!  run_sync ──────────────────────────────────────────────► Succeeded
//!
//!  run_async ─► Submitted ─► Polling ─┬─ SUCCEEDED ─► fetch pages ─► Succeeded
//!                              ▲      ├─ FAILED ──────────────────► Failed
//!                              │      └─ budget exhausted ─────────► TimedOut
//!                              └── IN_PROGRESS (one attempt slot)
//! ```
//!
//! ## Throttling
//!
//! Every backend call goes through [`JobExecutor::call`]. A
//! [`BackendError::Throttled`] answer is retried in place after
//! `base × 2ⁿ + base × U[0,1)` for the n-th retry (0-based), up to
//! `max_throttle_retries` times. Retried probes do not consume a polling
//! attempt. Every other backend error is fatal for the job.
//!
//! ## Waiting
//!
//! The executor sleeps `poll_interval` before each status probe, so the
//! first probe also happens one interval after submission. Both waits are
//! `tokio::time::sleep`; a job never busy-polls.

use crate::backend::{AnalysisBackend, DocumentLocation, PollResponse};
use crate::block::{ingest, Block, RawBlock};
use crate::config::ExtractionConfig;
use crate::error::{BackendError, ExtractError};
use crate::progress::JobProgressCallback;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Job id reported to progress callbacks for synchronous calls.
pub const SYNC_JOB_ID: &str = "sync";

/// Status of an asynchronous job as the backend reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Submitted,
    InProgress,
    /// `PARTIAL_SUCCESS` still carries result pages and is read as success.
    #[serde(alias = "PARTIAL_SUCCESS")]
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executor-side lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

/// A running asynchronous job.
///
/// Mutated only by the polling loop; `blocks` is append-only across pages.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub id: String,
    pub status: JobStatus,
    pub blocks: Vec<RawBlock>,
    pub next_token: Option<String>,
    /// Status probes consumed so far.
    pub attempts: u32,
    /// Result pages appended so far.
    pub pages: usize,
}

impl AnalysisJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Submitted,
            blocks: Vec::new(),
            next_token: None,
            attempts: 0,
            pages: 0,
        }
    }

    fn append_page(&mut self, page: PollResponse) {
        self.pages += 1;
        self.blocks.extend(page.blocks);
        self.next_token = page.next_token;
    }

    fn timed_out(&self) -> ExtractError {
        ExtractError::BackendTimeout {
            job_id: self.id.clone(),
            attempts: self.attempts,
            last_status: self.status,
        }
    }
}

/// Delay before the `retry`-th (0-based) retry of a throttled call.
///
/// `jitter` is a sample from `[0, 1)`.
pub fn backoff_delay(base: Duration, retry: u32, jitter: f64) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
        .saturating_add(base.mul_f64(jitter.clamp(0.0, 1.0)))
}

/// Drives backend calls for one document.
///
/// Holds no state between runs; distinct executors share nothing but the
/// backend and the configuration they borrow.
pub struct JobExecutor<'a> {
    backend: &'a dyn AnalysisBackend,
    config: &'a ExtractionConfig,
}

impl<'a> JobExecutor<'a> {
    pub fn new(backend: &'a dyn AnalysisBackend, config: &'a ExtractionConfig) -> Self {
        Self { backend, config }
    }

    fn progress(&self) -> Option<&dyn JobProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    fn notify_state(&self, job_id: &str, state: JobState) {
        if let Some(cb) = self.progress() {
            cb.on_state_change(job_id, state);
        }
    }

    /// Run one backend call, retrying it in place while it is throttled.
    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        job_id: Option<&str>,
        mut request: F,
    ) -> Result<T, ExtractError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut retry = 0;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_throttling() && retry < self.config.max_throttle_retries => {
                    let jitter = rand::thread_rng().gen::<f64>();
                    let delay = backoff_delay(self.config.throttle_base(), retry, jitter);
                    retry += 1;
                    warn!(
                        "{} throttled by {}: retry {}/{} after {:?}",
                        operation,
                        self.backend.name(),
                        retry,
                        self.config.max_throttle_retries,
                        delay
                    );
                    if let Some(cb) = self.progress() {
                        cb.on_throttled(operation, retry, delay);
                    }
                    sleep(delay).await;
                }
                Err(source) => {
                    return Err(ExtractError::Backend {
                        operation,
                        job_id: job_id.map(str::to_string),
                        source,
                    })
                }
            }
        }
    }

    /// Analyse a small document in one call.
    pub async fn run_sync(&self, document: &[u8]) -> Result<Vec<Block>, ExtractError> {
        let raw = self
            .call("analyze_sync", None, || self.backend.analyze_sync(document))
            .await?;
        debug!("Synchronous analysis returned {} blocks", raw.len());
        if let Some(cb) = self.progress() {
            cb.on_page(SYNC_JOB_ID, 1, raw.len());
        }
        let blocks = ingest(raw)?;
        self.notify_state(SYNC_JOB_ID, JobState::Succeeded);
        Ok(blocks)
    }

    /// Read a stored document's bytes, retrying throttled reads.
    pub async fn fetch(&self, location: &DocumentLocation) -> Result<Vec<u8>, ExtractError> {
        let bytes = self
            .call("fetch_document", None, || self.backend.fetch_document(location))
            .await?;
        debug!("Fetched {} bytes from {}", bytes.len(), location);
        Ok(bytes)
    }

    /// Text-only detection, used when no analysis path applies.
    pub async fn run_text_detection(&self, document: &[u8]) -> Result<Vec<Block>, ExtractError> {
        let raw = self
            .call("detect_text", None, || self.backend.detect_text(document))
            .await?;
        debug!("Text detection returned {} blocks", raw.len());
        Ok(ingest(raw)?)
    }

    /// Submit a stored document and poll the job to a terminal state.
    ///
    /// Returns every result page's blocks, in page order, ingested once.
    pub async fn run_async(&self, location: &DocumentLocation) -> Result<Vec<Block>, ExtractError> {
        let job_id = self
            .call("submit_async_job", None, || {
                self.backend.submit_async_job(location)
            })
            .await?;
        info!("Submitted {} as job {}", location, job_id);

        let mut job = AnalysisJob::new(job_id);
        self.notify_state(&job.id, JobState::Submitted);

        let outcome = match self.config.job_deadline() {
            Some(limit) => {
                let bounded = timeout(limit, self.poll_to_completion(&mut job)).await;
                match bounded {
                    Ok(result) => result,
                    Err(_) => {
                        debug!("Job {} hit its {:?} deadline", job.id, limit);
                        Err(job.timed_out())
                    }
                }
            }
            None => self.poll_to_completion(&mut job).await,
        };

        let state = match &outcome {
            Ok(_) => JobState::Succeeded,
            Err(ExtractError::BackendTimeout { .. }) => JobState::TimedOut,
            Err(_) => JobState::Failed,
        };
        self.notify_state(&job.id, state);
        outcome
    }

    async fn poll_to_completion(&self, job: &mut AnalysisJob) -> Result<Vec<Block>, ExtractError> {
        self.notify_state(&job.id, JobState::Polling);
        let max_attempts = self.config.max_attempts;

        while job.attempts < max_attempts {
            sleep(self.config.poll_interval()).await;

            let response = self
                .call("poll_async_job", Some(&job.id), || {
                    self.backend.poll_async_job(&job.id, None)
                })
                .await?;
            job.attempts += 1;
            job.status = response.status;
            debug!(
                "Job {} probe {}/{}: {}",
                job.id, job.attempts, max_attempts, response.status
            );
            if let Some(cb) = self.progress() {
                cb.on_probe(&job.id, job.attempts, max_attempts, response.status);
            }

            match response.status {
                JobStatus::Submitted | JobStatus::InProgress => {}
                JobStatus::Failed => {
                    return Err(ExtractError::BackendFailure {
                        job_id: job.id.clone(),
                        status_message: response
                            .status_message
                            .unwrap_or_else(|| "no status message".into()),
                        attempts: job.attempts,
                    });
                }
                JobStatus::Succeeded => {
                    self.record_page(job, response);
                    return self.fetch_remaining_pages(job).await;
                }
            }
        }

        Err(job.timed_out())
    }

    async fn fetch_remaining_pages(&self, job: &mut AnalysisJob) -> Result<Vec<Block>, ExtractError> {
        let mut seen = HashSet::new();
        while let Some(token) = job.next_token.take() {
            if !seen.insert(token.clone()) {
                return Err(self.runaway(job, format!("repeated NextToken '{token}'")));
            }
            if job.pages >= self.config.max_pages as usize {
                return Err(self.runaway(
                    job,
                    format!("more than {} result pages", self.config.max_pages),
                ));
            }
            let page = self
                .call("poll_async_job", Some(&job.id), || {
                    self.backend.poll_async_job(&job.id, Some(token.as_str()))
                })
                .await?;
            self.record_page(job, page);
        }

        info!(
            "Job {} succeeded: {} blocks over {} pages after {} probes",
            job.id,
            job.blocks.len(),
            job.pages,
            job.attempts
        );
        Ok(ingest(std::mem::take(&mut job.blocks))?)
    }

    fn runaway(&self, job: &AnalysisJob, reason: String) -> ExtractError {
        ExtractError::Backend {
            operation: "poll_async_job",
            job_id: Some(job.id.clone()),
            source: BackendError::Malformed(reason),
        }
    }

    fn record_page(&self, job: &mut AnalysisJob, page: PollResponse) {
        let block_count = page.blocks.len();
        job.append_page(page);
        debug!("Job {} page {}: {} blocks", job.id, job.pages, block_count);
        if let Some(cb) = self.progress() {
            cb.on_page(&job.id, job.pages, block_count);
        }
    }
}
