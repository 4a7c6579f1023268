//! Progress-callback trait for analysis job events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe a
//! job while the executor drives it: state transitions, every status probe,
//! throttling backoff and each result page fetched.
//!
//! # Example
//!
//! ```rust
//! use blockgraph::{ExtractionConfig, JobProgressCallback, JobStatus};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct ProbeCounter {
//!     probes: AtomicU32,
//! }
//!
//! impl JobProgressCallback for ProbeCounter {
//!     fn on_probe(&self, _job_id: &str, attempt: u32, max: u32, status: JobStatus) {
//!         self.probes.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("probe {attempt}/{max}: {status}");
//!     }
//! }
//!
//! let counter = Arc::new(ProbeCounter { probes: AtomicU32::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::job::{JobState, JobStatus};
use std::sync::Arc;
use std::time::Duration;

/// Called by the job executor as a job moves through its lifecycle.
///
/// Implementations must be `Send + Sync`: distinct jobs may be driven
/// concurrently and share one callback. All methods default to no-ops.
pub trait JobProgressCallback: Send + Sync {
    /// The job entered `state`.
    ///
    /// Synchronous calls report a single `Succeeded` under the id
    /// [`crate::job::SYNC_JOB_ID`].
    fn on_state_change(&self, job_id: &str, state: JobState) {
        let _ = (job_id, state);
    }

    /// A status probe returned.
    ///
    /// # Arguments
    /// * `attempt`: 1-based slot this probe consumed
    /// * `max_attempts`: total probe budget
    /// * `status`: status the backend reported
    fn on_probe(&self, job_id: &str, attempt: u32, max_attempts: u32, status: JobStatus) {
        let _ = (job_id, attempt, max_attempts, status);
    }

    /// A backend call was throttled and will be retried after `delay`.
    ///
    /// # Arguments
    /// * `operation`: backend operation name, e.g. `"poll_async_job"`
    /// * `retry`: 1-based retry number for this call
    fn on_throttled(&self, operation: &str, retry: u32, delay: Duration) {
        let _ = (operation, retry, delay);
    }

    /// A page of results was appended.
    ///
    /// # Arguments
    /// * `page_num`: 1-based page number
    /// * `block_count`: raw blocks on this page
    fn on_page(&self, job_id: &str, page_num: usize, block_count: usize) {
        let _ = (job_id, page_num, block_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
