//! Integration tests: the public extraction API end to end.
//!
//! Recorded analysis responses live in `tests/fixtures/`. Page 1 is a job
//! response object, page 2 a bare block array; together they describe a
//! two-page invoice with one table and one form field per page.
//!
//! Backends are in-process (`ReplayBackend` or a scripted backend), and
//! async tests run with paused time so polling and backoff waits cost
//! nothing.

use async_trait::async_trait;
use blockgraph::{
    to_markdown, AnalysisBackend, BackendError, Document, DocumentClass, DocumentLocation,
    DuplicateKeyPolicy, ExtractError, ExtractionConfig, ExtractionResult, Extractor,
    JobProgressCallback, JobState, JobStatus, PollResponse, ProgressCallback, RawBlock,
    ReplayBackend,
};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=blockgraph=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn invoice_backend() -> ReplayBackend {
    ReplayBackend::from_files(&[fixture("invoice_page1.json"), fixture("invoice_page2.json")])
        .expect("fixtures load")
}

fn fast_config() -> ExtractionConfig {
    ExtractionConfig::builder()
        .poll_interval_ms(100)
        .max_attempts(5)
        .build()
        .unwrap()
}

fn invoice_pdf() -> Document {
    Document::at(DocumentLocation::new("invoices", "2024/inv-17.pdf"))
}

fn expected_invoice() -> ExtractionResult {
    ExtractionResult {
        plain_text: "Invoice 17\nName Alice\nTotal paid".into(),
        tables: vec![
            blockgraph::Table {
                index: 0,
                rows: vec![
                    vec!["Item".into(), "Paid".into()],
                    vec!["Widget".into(), "".into()],
                ],
            },
            blockgraph::Table {
                index: 1,
                rows: vec![vec!["paid".into(), "X".into()]],
            },
        ],
        forms: BTreeMap::from([
            ("Date".to_string(), "2024-01-31".to_string()),
            ("Name".to_string(), "Alice".to_string()),
        ]),
    }
}

/// Probes answered from a script, then `IN_PROGRESS` forever. Implements
/// neither pagination nor text detection.
#[derive(Default)]
struct ScriptedBackend {
    probes: Mutex<VecDeque<Result<PollResponse, BackendError>>>,
    calls: AtomicU32,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<PollResponse, BackendError>>) -> Self {
        Self {
            probes: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze_sync(&self, _document: &[u8]) -> Result<Vec<RawBlock>, BackendError> {
        Err(BackendError::Rejected {
            code: "UnsupportedDocumentException".into(),
            message: "not an image".into(),
        })
    }

    async fn submit_async_job(&self, _location: &DocumentLocation) -> Result<String, BackendError> {
        Ok("scripted-job".into())
    }

    async fn poll_async_job(
        &self,
        _job_id: &str,
        _next_token: Option<&str>,
    ) -> Result<PollResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.probes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(PollResponse {
                status: JobStatus::InProgress,
                ..Default::default()
            })
        })
    }
}

// ── Reconstruction through the facade ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn asynchronous_job_reconstructs_all_pages() {
    let extractor = Extractor::new(Arc::new(invoice_backend()), fast_config());
    let result = extractor.extract(&invoice_pdf()).await.unwrap();
    assert_eq!(result, expected_invoice());
}

#[tokio::test]
async fn synchronous_and_asynchronous_paths_agree() {
    let extractor = Extractor::new(Arc::new(invoice_backend()), fast_config());
    let image = Document::new("invoice.png", vec![0x89, b'P', b'N', b'G']);
    let result = extractor.extract(&image).await.unwrap();
    assert_eq!(result, expected_invoice());
}

#[tokio::test(start_paused = true)]
async fn extraction_is_deterministic() {
    let extractor = Extractor::new(Arc::new(invoice_backend()), fast_config());
    let first = extractor.extract(&invoice_pdf()).await.unwrap();
    let second = extractor.extract(&invoice_pdf()).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(to_markdown(&first), to_markdown(&second));
}

#[tokio::test(start_paused = true)]
async fn markdown_rendering_of_invoice() {
    let extractor = Extractor::new(Arc::new(invoice_backend()), fast_config());
    let md = to_markdown(&extractor.extract(&invoice_pdf()).await.unwrap());
    assert!(md.contains("## Table 1\n\n| Item | Paid |\n| --- | --- |\n| Widget |  |"));
    assert!(md.contains("## Table 2\n\n| paid | X |\n| --- | --- |"));
    assert!(md.contains("| Name | Alice |"));
}

#[tokio::test]
async fn plain_text_never_reaches_the_backend() {
    let backend = Arc::new(ScriptedBackend::default());
    let extractor = Extractor::new(backend.clone(), fast_config());
    let result = extractor
        .extract(&Document::new("notes.txt", "just text"))
        .await
        .unwrap();
    assert_eq!(result, ExtractionResult::text_only("just text"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stored_inputs_are_fetched_before_extraction() {
    let notes = DocumentLocation::new("bkt", "notes.txt");
    let scan = DocumentLocation::new("bkt", "scans/invoice.png");
    let backend = Arc::new(
        invoice_backend()
            .with_document(&notes, "remember the milk")
            .with_document(&scan, vec![0x89, b'P', b'N', b'G']),
    );
    let extractor = Extractor::new(backend.clone(), fast_config());

    let text = extractor.extract_input("s3://bkt/notes.txt").await.unwrap();
    assert_eq!(text, ExtractionResult::text_only("remember the milk"));

    let image = extractor
        .extract_input("s3://bkt/scans/invoice.png")
        .await
        .unwrap();
    assert_eq!(image, expected_invoice());
    // Synchronous analysis: no job was polled.
    assert_eq!(backend.probe_count(), 0);
}

#[tokio::test]
async fn class_override_wins_over_extension() {
    let extractor = Extractor::new(Arc::new(invoice_backend()), fast_config());
    let doc = Document::new("upload.bin", vec![1, 2, 3]).with_class(DocumentClass::SinglePageImage);
    let result = extractor.extract(&doc).await.unwrap();
    assert_eq!(result.tables.len(), 2);
}

#[tokio::test]
async fn duplicate_key_policy_reaches_form_reconstruction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dupes.json");
    std::fs::write(
        &path,
        r#"[
          {"Id": "k1", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["KEY"], "Text": "Phone",
           "Relationships": [{"Type": "VALUE", "Ids": ["v1"]}]},
          {"Id": "v1", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["VALUE"], "Text": "555-0100"},
          {"Id": "k2", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["KEY"], "Text": "Phone",
           "Relationships": [{"Type": "VALUE", "Ids": ["v2"]}]},
          {"Id": "v2", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["VALUE"], "Text": "555-0199"}
        ]"#,
    )
    .unwrap();

    let run = |policy| {
        let backend = ReplayBackend::from_files(&[&path]).unwrap();
        let config = ExtractionConfig::builder().duplicate_keys(policy).build().unwrap();
        Extractor::new(Arc::new(backend), config)
    };
    let image = Document::new("card.jpg", vec![0xFF, 0xD8]);

    let last = run(DuplicateKeyPolicy::LastWriteWins).extract(&image).await.unwrap();
    assert_eq!(last.forms["Phone"], "555-0199");
    let first = run(DuplicateKeyPolicy::FirstWriteWins).extract(&image).await.unwrap();
    assert_eq!(first.forms["Phone"], "555-0100");
    let merged = run(DuplicateKeyPolicy::Merge).extract(&image).await.unwrap();
    assert_eq!(merged.forms["Phone"], "555-0100\n555-0199");
}

// ── Job failures surfaced by the facade ──────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn long_running_job_times_out_with_diagnostics() {
    init_tracing();
    let backend = Arc::new(invoice_backend().with_in_progress_probes(50));
    let extractor = Extractor::new(backend.clone(), fast_config());
    let err = extractor.extract(&invoice_pdf()).await.unwrap_err();

    match err {
        ExtractError::BackendTimeout {
            job_id,
            attempts,
            last_status,
        } => {
            assert_eq!(job_id, "replay-job");
            assert_eq!(attempts, 5);
            assert_eq!(last_status, JobStatus::InProgress);
        }
        other => panic!("expected BackendTimeout, got {other:?}"),
    }
    assert_eq!(backend.probe_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn throttling_is_absorbed_without_spending_attempts() {
    init_tracing();
    let throttled = || Err(BackendError::Throttled("Rate exceeded".into()));
    let backend = Arc::new(ScriptedBackend::new(vec![
        throttled(),
        throttled(),
        Ok(PollResponse {
            status: JobStatus::InProgress,
            ..Default::default()
        }),
    ]));
    let extractor = Extractor::new(backend.clone(), fast_config());
    let err = extractor.extract(&invoice_pdf()).await.unwrap_err();

    assert!(matches!(err, ExtractError::BackendTimeout { attempts: 5, .. }));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 7);
}

#[tokio::test(start_paused = true)]
async fn failed_job_reports_backend_message() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(PollResponse {
        status: JobStatus::Failed,
        status_message: Some("Request has unsupported document format".into()),
        ..Default::default()
    })]));
    let extractor = Extractor::new(backend, fast_config());
    let err = extractor.extract(&invoice_pdf()).await.unwrap_err();

    assert!(matches!(err, ExtractError::BackendFailure { attempts: 1, .. }));
    assert!(err.to_string().contains("unsupported document format"));
}

#[tokio::test]
async fn sync_rejection_is_a_backend_error() {
    let extractor = Extractor::new(Arc::new(ScriptedBackend::default()), fast_config());
    let err = extractor
        .extract(&Document::new("scan.png", vec![1]))
        .await
        .unwrap_err();
    match err {
        ExtractError::Backend { operation, job_id, .. } => {
            assert_eq!(operation, "analyze_sync");
            assert!(job_id.is_none());
        }
        other => panic!("expected Backend, got {other:?}"),
    }
}

#[tokio::test]
async fn unrecognised_input_without_text_detection_is_unsupported() {
    let extractor = Extractor::new(Arc::new(ScriptedBackend::default()), fast_config());
    let err = extractor
        .extract(&Document::new("archive.zip", vec![b'P', b'K']))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::UnsupportedFormat { .. }));
}

#[tokio::test]
async fn invalid_block_graph_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"[{"Id": "s1", "BlockType": "SELECTION_ELEMENT", "SelectionStatus": "MAYBE"}]"#,
    )
    .unwrap();
    let backend = ReplayBackend::from_files(&[&path]).unwrap();
    let extractor = Extractor::new(Arc::new(backend), fast_config());
    let err = extractor
        .extract(&Document::new("scan.png", vec![1]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Parse(_)));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    states: Mutex<Vec<JobState>>,
    probes: AtomicU32,
    pages: Mutex<Vec<(usize, usize)>>,
}

impl JobProgressCallback for Recorder {
    fn on_state_change(&self, _job_id: &str, state: JobState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_probe(&self, _job_id: &str, _attempt: u32, _max: u32, _status: JobStatus) {
        self.probes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page(&self, _job_id: &str, page_num: usize, block_count: usize) {
        self.pages.lock().unwrap().push((page_num, block_count));
    }

    fn on_throttled(&self, _operation: &str, _retry: u32, _delay: Duration) {}
}

#[tokio::test(start_paused = true)]
async fn progress_callback_follows_the_job() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .poll_interval_ms(100)
        .progress_callback(recorder.clone() as ProgressCallback)
        .build()
        .unwrap();
    let backend = invoice_backend().with_in_progress_probes(2);
    let extractor = Extractor::new(Arc::new(backend), config);
    extractor.extract(&invoice_pdf()).await.unwrap();

    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![JobState::Submitted, JobState::Polling, JobState::Succeeded]
    );
    assert_eq!(recorder.probes.load(Ordering::SeqCst), 3);
    assert_eq!(*recorder.pages.lock().unwrap(), vec![(1, 16), (2, 12)]);
}
