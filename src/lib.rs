//! # blockgraph
//!
//! Reconstruct plain text, tables and key/value forms from the block graph a
//! document-analysis service (Textract-style) returns.
//!
//! ## Why this crate?
//!
//! Analysis services do not return "the table" or "the form". They return a
//! flat list of blocks (pages, lines, words, cells, key/value entries,
//! selection marks) wired together by id references. Turning that graph
//! back into rectangular tables and a key → value map is fiddly, and the
//! job around it (synchronous call for an image, submit-and-poll with
//! pagination and throttling for a PDF) is easy to get subtly wrong. This
//! crate does both, behind one [`Extractor`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! input
//!  │
//!  ├─ 1. Input        resolve a local file, HTTP(S) URL or S3 location
//!  ├─ 2. Classify     plain text / image / multi-page container / other
//!  ├─ 3. Job          sync call, or submit → poll → follow pages
//!  ├─ 4. Ingest       validate raw blocks into a closed `Block` type
//!  ├─ 5. Reconstruct  index → plain text, tables, forms
//!  └─ 6. Output       `ExtractionResult` (text / markdown / JSON)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockgraph::{Extractor, ExtractionConfig, HttpBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = HttpBackend::new("http://localhost:8080/", Duration::from_secs(30))?;
//!     let extractor = Extractor::new(Arc::new(backend), ExtractionConfig::default());
//!     let result = extractor.extract_input("s3://invoices/2024/inv-17.pdf").await?;
//!     println!("{}", result.plain_text);
//!     for (key, value) in &result.forms {
//!         println!("{key}: {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Reconstruction alone needs no backend:
//!
//! ```rust
//! use blockgraph::{block::parse_blocks, reconstruct, DuplicateKeyPolicy};
//!
//! let blocks = parse_blocks(br#"[
//!     {"Id": "1", "BlockType": "LINE", "Text": "Hello"},
//!     {"Id": "2", "BlockType": "LINE", "Text": "World"}
//! ]"#).unwrap();
//! let result = reconstruct(&blocks, DuplicateKeyPolicy::default());
//! assert_eq!(result.plain_text, "Hello\nWorld");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `blockgraph` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! blockgraph = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod block;
pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod input;
pub mod job;
pub mod output;
pub mod progress;
pub mod reconstruct;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{AnalysisBackend, DocumentLocation, HttpBackend, PollResponse, ReplayBackend};
pub use block::{Block, BlockKind, EntryRole, RawBlock, Relation};
pub use config::{DuplicateKeyPolicy, ExtractionConfig, ExtractionConfigBuilder};
pub use error::{BackendError, BlockError, ExtractError};
pub use extract::Extractor;
pub use format::{to_markdown, to_text};
pub use input::{resolve_input, Document, DocumentClass};
pub use job::{AnalysisJob, JobExecutor, JobState, JobStatus};
pub use output::{ExtractionResult, Table};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reconstruct::{reconstruct, BlockIndex};
pub use stream::{extract_inputs, extract_stream, ExtractionItem, ExtractionStream};
