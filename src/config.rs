//! Configuration types for block-graph extraction.
//!
//! Every knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is constructed once at start-up,
//! handed to [`crate::Extractor::new`] and never mutated afterwards.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for extraction runs.
///
/// # Example
/// ```rust
/// use blockgraph::{DuplicateKeyPolicy, ExtractionConfig};
///
/// let config = ExtractionConfig::builder()
///     .max_attempts(60)
///     .poll_interval_ms(5_000)
///     .duplicate_keys(DuplicateKeyPolicy::Merge)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum status probes for an asynchronous job. Default: 120.
    ///
    /// Throttled probes that are retried do not count against this budget.
    pub max_attempts: u32,

    /// Wait before each status probe, in milliseconds. Default: 2000.
    ///
    /// With the default budget a job may run for roughly four minutes
    /// before it is reported as timed out.
    pub poll_interval_ms: u64,

    /// Retries of a single throttled backend call. Default: 3.
    pub max_throttle_retries: u32,

    /// Backoff unit in milliseconds. Default: 1000.
    ///
    /// Retry `n` (0-based) waits `base × 2ⁿ + base × U[0,1)`: with the
    /// default that is 1–2 s, 2–3 s, 4–5 s.
    pub throttle_base_ms: u64,

    /// Wall-clock cap on a whole asynchronous job. Default: none.
    ///
    /// The polling budget already bounds a job; the deadline additionally
    /// bounds time spent in throttling backoff and pagination.
    pub job_deadline_secs: Option<u64>,

    /// Result pages one job may return before it is treated as runaway. Default: 10000.
    pub max_pages: u32,

    /// How repeated key text is folded into the form map. Default: last write wins.
    pub duplicate_keys: DuplicateKeyPolicy,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives job lifecycle events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            poll_interval_ms: 2_000,
            max_throttle_retries: 3,
            throttle_base_ms: 1_000,
            job_deadline_secs: None,
            max_pages: 10_000,
            duplicate_keys: DuplicateKeyPolicy::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_attempts", &self.max_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_throttle_retries", &self.max_throttle_retries)
            .field("throttle_base_ms", &self.throttle_base_ms)
            .field("job_deadline_secs", &self.job_deadline_secs)
            .field("max_pages", &self.max_pages)
            .field("duplicate_keys", &self.duplicate_keys)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn throttle_base(&self) -> Duration {
        Duration::from_millis(self.throttle_base_ms)
    }

    pub fn job_deadline(&self) -> Option<Duration> {
        self.job_deadline_secs.map(Duration::from_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_throttle_retries(mut self, n: u32) -> Self {
        self.config.max_throttle_retries = n;
        self
    }

    pub fn throttle_base_ms(mut self, ms: u64) -> Self {
        self.config.throttle_base_ms = ms;
        self
    }

    pub fn job_deadline_secs(mut self, secs: u64) -> Self {
        self.config.job_deadline_secs = Some(secs);
        self
    }

    pub fn max_pages(mut self, n: u32) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.config.duplicate_keys = policy;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        // 2^retry overflows u64 milliseconds well before 64 retries.
        if c.max_throttle_retries > 32 {
            return Err(ExtractError::InvalidConfig(format!(
                "max_throttle_retries must be ≤ 32, got {}",
                c.max_throttle_retries
            )));
        }
        if c.max_pages == 0 {
            return Err(ExtractError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.job_deadline_secs == Some(0) {
            return Err(ExtractError::InvalidConfig(
                "job deadline must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What happens when two KEY entries resolve to the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// The later entry replaces the earlier one. (default)
    #[default]
    LastWriteWins,
    /// The first entry is kept; later ones are ignored.
    FirstWriteWins,
    /// Non-empty values are newline-joined in encounter order.
    Merge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_attempts, 120);
        assert_eq!(c.poll_interval(), Duration::from_secs(2));
        assert_eq!(c.max_throttle_retries, 3);
        assert_eq!(c.throttle_base(), Duration::from_secs(1));
        assert_eq!(c.job_deadline(), None);
        assert_eq!(c.max_pages, 10_000);
        assert_eq!(c.duplicate_keys, DuplicateKeyPolicy::LastWriteWins);
    }

    #[test]
    fn builder_sets_fields() {
        let c = ExtractionConfig::builder()
            .max_attempts(5)
            .poll_interval_ms(10)
            .max_throttle_retries(1)
            .throttle_base_ms(20)
            .job_deadline_secs(30)
            .duplicate_keys(DuplicateKeyPolicy::FirstWriteWins)
            .build()
            .unwrap();
        assert_eq!(c.max_attempts, 5);
        assert_eq!(c.poll_interval(), Duration::from_millis(10));
        assert_eq!(c.throttle_base(), Duration::from_millis(20));
        assert_eq!(c.job_deadline(), Some(Duration::from_secs(30)));
        assert_eq!(c.duplicate_keys, DuplicateKeyPolicy::FirstWriteWins);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = ExtractionConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn zero_page_cap_is_rejected() {
        let err = ExtractionConfig::builder().max_pages(0).build().unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn excessive_throttle_retries_are_rejected() {
        assert!(ExtractionConfig::builder()
            .max_throttle_retries(40)
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", ExtractionConfig::default());
        assert!(dbg.contains("max_attempts"));
        assert!(dbg.contains("progress_callback: None"));
    }
}
