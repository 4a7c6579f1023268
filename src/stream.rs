//! Batch extraction: drive several documents concurrently.
//!
//! Distinct documents share nothing but the backend and the configuration,
//! so their jobs can run side by side. Results are yielded as each document
//! finishes, which is not necessarily input order; every item carries its
//! position in the input and the document name (or input string).

use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::input::{self, Document};
use crate::output::ExtractionResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// One finished document.
#[derive(Debug)]
pub struct ExtractionItem {
    /// Position in the input list; unique even when names repeat.
    pub index: usize,
    pub name: String,
    pub result: Result<ExtractionResult, ExtractError>,
}

/// A boxed stream of finished documents.
pub type ExtractionStream = Pin<Box<dyn Stream<Item = ExtractionItem> + Send>>;

/// Extract every document, at most `concurrency` at a time.
///
/// # Example
/// ```rust,no_run
/// use blockgraph::{extract_stream, Document, ExtractionConfig, Extractor, ReplayBackend};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let extractor = Extractor::new(
///     Arc::new(ReplayBackend::new(Vec::new())),
///     ExtractionConfig::default(),
/// );
/// let docs = vec![Document::new("a.txt", "one"), Document::new("b.txt", "two")];
/// let mut results = extract_stream(&extractor, docs, 4);
/// while let Some(item) = results.next().await {
///     match item.result {
///         Ok(r) => println!("{}: {} chars", item.name, r.plain_text.len()),
///         Err(e) => eprintln!("{}: {e}", item.name),
///     }
/// }
/// # }
/// ```
pub fn extract_stream(
    extractor: &Extractor,
    documents: Vec<Document>,
    concurrency: usize,
) -> ExtractionStream {
    info!(
        "Extracting {} documents, concurrency {}",
        documents.len(),
        concurrency.max(1)
    );
    let extractor = extractor.clone();
    let s = stream::iter(documents.into_iter().enumerate().map(move |(index, document)| {
        let extractor = extractor.clone();
        async move {
            let result = extractor.extract(&document).await;
            ExtractionItem {
                index,
                name: document.name,
                result,
            }
        }
    }))
    .buffer_unordered(concurrency.max(1));

    Box::pin(s)
}

/// Like [`extract_stream`], resolving each path or URL first.
///
/// Items are keyed by the input string as given.
pub fn extract_inputs(
    extractor: &Extractor,
    inputs: Vec<String>,
    concurrency: usize,
) -> ExtractionStream {
    let extractor = extractor.clone();
    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input_str)| {
        let extractor = extractor.clone();
        async move {
            let timeout = extractor.config().download_timeout_secs;
            let result = match input::resolve_input(&input_str, timeout).await {
                Ok(document) => extractor.extract(&document).await,
                Err(e) => Err(e),
            };
            ExtractionItem {
                index,
                name: input_str,
                result,
            }
        }
    }))
    .buffer_unordered(concurrency.max(1));

    Box::pin(s)
}
