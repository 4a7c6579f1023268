//! The extraction facade: pick a path for a document, run it, reconstruct.
//!
//! | Class                | Path                                          |
//! |----------------------|-----------------------------------------------|
//! | `PlainText`          | bytes decoded directly, no analysis call      |
//! | `SinglePageImage`    | synchronous analysis                          |
//! | `MultiPageContainer` | asynchronous job (needs a storage location)   |
//! | `Unrecognized`       | asynchronous job when a location is known,    |
//! |                      | otherwise text detection as a last resort     |
//!
//! A document known only by its storage location has its bytes fetched
//! through the backend first. A stored image whose backend cannot read
//! storage is analysed as an asynchronous job instead.
//!
//! Every analysed path funnels its blocks through
//! [`crate::reconstruct::reconstruct`], so the result shape is the same
//! whichever path ran.

use crate::backend::AnalysisBackend;
use crate::config::ExtractionConfig;
use crate::block::Block;
use crate::error::{BackendError, ExtractError};
use crate::input::{self, Document, DocumentClass};
use crate::job::JobExecutor;
use crate::output::ExtractionResult;
use crate::reconstruct::{reconstruct, text::plain_text};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Entry point for extraction.
///
/// Built once with its backend and configuration; both are immutable
/// afterwards. `Extractor` is `Send + Sync` and can be shared behind an
/// `Arc` to drive several documents concurrently.
///
/// # Example
/// ```rust
/// use blockgraph::{Document, ExtractionConfig, Extractor, ReplayBackend};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = Extractor::new(
///     Arc::new(ReplayBackend::new(Vec::new())),
///     ExtractionConfig::default(),
/// );
/// let result = extractor.extract(&Document::new("notes.txt", "Hello")).await?;
/// assert_eq!(result.plain_text, "Hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Extractor {
    backend: Arc<dyn AnalysisBackend>,
    config: ExtractionConfig,
}

impl Extractor {
    pub fn new(backend: Arc<dyn AnalysisBackend>, config: ExtractionConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn AnalysisBackend {
        self.backend.as_ref()
    }

    /// Extract text, tables and forms from one document.
    ///
    /// # Errors
    /// * [`ExtractError::MissingLocation`] for a multi-page container with no
    ///   storage location
    /// * [`ExtractError::UnsupportedFormat`] when no path applies and text
    ///   detection also fails
    /// * [`ExtractError::BackendFailure`], [`ExtractError::BackendTimeout`]
    ///   and [`ExtractError::Backend`] from the job executor
    /// * [`ExtractError::Parse`] when the backend's blocks cannot be ingested
    /// * [`ExtractError::Backend`] when a stored document cannot be fetched
    pub async fn extract(&self, document: &Document) -> Result<ExtractionResult, ExtractError> {
        let start = Instant::now();
        let executor = JobExecutor::new(self.backend.as_ref(), &self.config);

        let blocks = match document.class {
            DocumentClass::PlainText => {
                let text = match &document.location {
                    Some(location) if !document.has_content() => {
                        String::from_utf8_lossy(&executor.fetch(location).await?).into_owned()
                    }
                    _ => String::from_utf8_lossy(&document.bytes).into_owned(),
                };
                debug!("{}: plain text, no analysis", document.name);
                return Ok(ExtractionResult::text_only(text));
            }
            DocumentClass::SinglePageImage if document.has_content() => {
                info!("{}: synchronous analysis via {}", document.name, self.backend.name());
                executor.run_sync(&document.bytes).await?
            }
            DocumentClass::SinglePageImage if document.location.is_some() => {
                self.analyze_stored_image(&executor, document).await?
            }
            DocumentClass::SinglePageImage | DocumentClass::MultiPageContainer => {
                let location = document.location.as_ref().ok_or_else(|| {
                    ExtractError::MissingLocation {
                        name: document.name.clone(),
                    }
                })?;
                info!("{}: asynchronous analysis via {}", document.name, self.backend.name());
                executor.run_async(location).await?
            }
            DocumentClass::Unrecognized => match &document.location {
                Some(location) => {
                    info!("{}: unrecognised, trying asynchronous analysis", document.name);
                    executor.run_async(location).await?
                }
                None => return self.detect_text_fallback(&executor, document).await,
            },
        };

        let result = reconstruct(&blocks, self.config.duplicate_keys);
        info!(
            "{}: {} blocks → {} tables, {} form fields in {}ms",
            document.name,
            blocks.len(),
            result.tables.len(),
            result.forms.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Fetch a stored image and analyse it synchronously, or leave it to an
    /// asynchronous job when the backend cannot read storage.
    async fn analyze_stored_image(
        &self,
        executor: &JobExecutor<'_>,
        document: &Document,
    ) -> Result<Vec<Block>, ExtractError> {
        let Some(location) = document.location.as_ref() else {
            return Err(ExtractError::MissingLocation {
                name: document.name.clone(),
            });
        };
        match executor.fetch(location).await {
            Ok(bytes) => {
                info!("{}: synchronous analysis via {}", document.name, self.backend.name());
                executor.run_sync(&bytes).await
            }
            Err(ExtractError::Backend {
                source: BackendError::Unsupported,
                ..
            }) => {
                info!("{}: asynchronous analysis via {}", document.name, self.backend.name());
                executor.run_async(location).await
            }
            Err(e) => Err(e),
        }
    }

    async fn detect_text_fallback(
        &self,
        executor: &JobExecutor<'_>,
        document: &Document,
    ) -> Result<ExtractionResult, ExtractError> {
        if !document.has_content() {
            return Err(ExtractError::UnsupportedFormat {
                name: document.name.clone(),
                reason: "no content and no storage location".into(),
            });
        }
        info!("{}: unrecognised, falling back to text detection", document.name);
        match executor.run_text_detection(&document.bytes).await {
            Ok(blocks) => Ok(ExtractionResult::text_only(plain_text(&blocks))),
            Err(e @ ExtractError::Parse(_)) => Err(e),
            Err(e) => Err(ExtractError::UnsupportedFormat {
                name: document.name.clone(),
                reason: format!("text detection failed: {e}"),
            }),
        }
    }

    /// Resolve a path or URL, then extract it.
    pub async fn extract_input(&self, input: &str) -> Result<ExtractionResult, ExtractError> {
        let document = input::resolve_input(input, self.config.download_timeout_secs).await?;
        self.extract(&document).await
    }

    /// Synchronous wrapper around [`extract`](Self::extract).
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn extract_blocking(&self, document: &Document) -> Result<ExtractionResult, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.extract(document))
    }
}
