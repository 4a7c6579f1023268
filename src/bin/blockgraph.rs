//! CLI binary for blockgraph.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, picks a backend and prints results.

use anyhow::{bail, Context, Result};
use blockgraph::{
    extract_inputs, resolve_input, to_markdown, to_text, AnalysisBackend, DocumentClass,
    DocumentLocation, DuplicateKeyPolicy, ExtractionConfig, ExtractionItem, ExtractionResult,
    Extractor, HttpBackend, JobProgressCallback, JobState, JobStatus, ProgressCallback,
    ReplayBackend,
};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner whose message follows the job, plus
/// log lines for throttling and result pages.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("resolving input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_state_change(&self, job_id: &str, state: JobState) {
        let msg = match state {
            JobState::Submitted => format!("job {job_id} submitted"),
            JobState::Polling => format!("job {job_id} polling"),
            JobState::Succeeded => format!("job {job_id} succeeded"),
            JobState::Failed => format!("job {job_id} failed"),
            JobState::TimedOut => format!("job {job_id} timed out"),
        };
        self.bar.set_message(msg);
    }

    fn on_probe(&self, job_id: &str, attempt: u32, max_attempts: u32, status: JobStatus) {
        self.bar
            .set_message(format!("job {job_id}  probe {attempt}/{max_attempts}  {status}"));
    }

    fn on_throttled(&self, operation: &str, retry: u32, delay: Duration) {
        self.bar.println(format!(
            "  {} {} throttled, retry {} in {}",
            cyan("⚠"),
            operation,
            retry,
            dim(&format!("{:.1}s", delay.as_secs_f64())),
        ));
    }

    fn on_page(&self, job_id: &str, page_num: usize, block_count: usize) {
        self.bar.println(format!(
            "  {} {} page {:>3}  {}",
            green("✓"),
            dim(job_id),
            page_num,
            dim(&format!("{block_count:>5} blocks")),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Reconstruct a saved analysis response (no network)
  blockgraph scan.png --replay response.json

  # Multi-page result recorded as one file per page
  blockgraph report.pdf --location s3://bkt/report.pdf --replay p1.json p2.json p3.json

  # Analyse through a gateway, Markdown output
  blockgraph s3://invoices/2024/inv-17.pdf --endpoint http://localhost:8080/ --format markdown

  # JSON output to a file, merging repeated form keys
  blockgraph form.jpg --endpoint http://localhost:8080/ --format json --duplicate-keys merge -o form.json

  # Several inputs at once
  blockgraph a.png b.png c.txt --endpoint http://localhost:8080/ --concurrency 3

CLASSIFICATION (by extension unless --class is given):
  .txt                               text       read directly, no backend call
  .jpg .jpeg .png .tif .tiff .bmp    image      one synchronous analysis call
  .pdf                               container  asynchronous job (needs a storage location)
  anything else                      other      asynchronous job if a location is known,
                                                otherwise text detection

ENVIRONMENT VARIABLES:
  BLOCKGRAPH_ENDPOINT     Gateway base URL (same as --endpoint)
  RUST_LOG                Override log filtering (e.g. blockgraph=debug)
"#;

/// Reconstruct text, tables and forms from document-analysis output.
#[derive(Parser, Debug)]
#[command(
    name = "blockgraph",
    version,
    about = "Reconstruct text, tables and forms from document-analysis block graphs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file, HTTP/HTTPS URL or S3 URL. Several inputs run concurrently.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Override classification: text, image, container or other.
    #[arg(long, value_enum)]
    class: Option<ClassArg>,

    /// Serve analysis results from recorded JSON responses, one file per page.
    #[arg(long, num_args = 1.., value_name = "FILE", conflicts_with = "endpoint")]
    replay: Vec<PathBuf>,

    /// Base URL of a Textract-compatible analysis gateway.
    #[arg(long, env = "BLOCKGRAPH_ENDPOINT")]
    endpoint: Option<String>,

    /// Storage location (s3://bucket/key) the backend reads for asynchronous analysis.
    #[arg(long)]
    location: Option<String>,

    /// Output format.
    #[arg(long, env = "BLOCKGRAPH_FORMAT", value_enum, default_value = "text")]
    format: FormatArg,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "BLOCKGRAPH_OUTPUT")]
    output: Option<PathBuf>,

    /// Maximum status probes for an asynchronous job.
    #[arg(long, env = "BLOCKGRAPH_MAX_ATTEMPTS", default_value_t = 120)]
    max_attempts: u32,

    /// Wait before each status probe, in milliseconds.
    #[arg(long, env = "BLOCKGRAPH_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Retries of a single throttled backend call.
    #[arg(long, env = "BLOCKGRAPH_MAX_THROTTLE_RETRIES", default_value_t = 3)]
    max_throttle_retries: u32,

    /// How repeated form keys are folded: last, first or merge.
    #[arg(long, env = "BLOCKGRAPH_DUPLICATE_KEYS", value_enum, default_value = "last")]
    duplicate_keys: DuplicateKeysArg,

    /// Result pages one job may return before it is abandoned.
    #[arg(long, env = "BLOCKGRAPH_MAX_PAGES", default_value_t = 10_000)]
    max_pages: u32,

    /// Wall-clock cap on one asynchronous job, in seconds.
    #[arg(long, env = "BLOCKGRAPH_DEADLINE_SECS")]
    deadline_secs: Option<u64>,

    /// Documents processed at once when several inputs are given.
    #[arg(short, long, env = "BLOCKGRAPH_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-request timeout for the gateway, in seconds.
    #[arg(long, env = "BLOCKGRAPH_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// HTTP download timeout for URL inputs, in seconds.
    #[arg(long, env = "BLOCKGRAPH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "BLOCKGRAPH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BLOCKGRAPH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BLOCKGRAPH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ClassArg {
    Text,
    Image,
    Container,
    Other,
}

impl From<ClassArg> for DocumentClass {
    fn from(v: ClassArg) -> Self {
        match v {
            ClassArg::Text => DocumentClass::PlainText,
            ClassArg::Image => DocumentClass::SinglePageImage,
            ClassArg::Container => DocumentClass::MultiPageContainer,
            ClassArg::Other => DocumentClass::Unrecognized,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Text,
    Markdown,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DuplicateKeysArg {
    Last,
    First,
    Merge,
}

impl From<DuplicateKeysArg> for DuplicateKeyPolicy {
    fn from(v: DuplicateKeysArg) -> Self {
        match v {
            DuplicateKeysArg::Last => DuplicateKeyPolicy::LastWriteWins,
            DuplicateKeysArg::First => DuplicateKeyPolicy::FirstWriteWins,
            DuplicateKeysArg::Merge => DuplicateKeyPolicy::Merge,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs stay quiet while the spinner is active; it shows the same
    // lifecycle events.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.inputs.len() > 1 && (cli.class.is_some() || cli.location.is_some()) {
        bail!("--class and --location apply to a single input");
    }

    // ── Build backend and config ─────────────────────────────────────────
    let backend = build_backend(&cli)?;
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;
    let extractor = Extractor::new(backend, config);

    // ── Run extraction ───────────────────────────────────────────────────
    let start = Instant::now();
    let outcome = if cli.inputs.len() == 1 {
        run_single(&cli, &extractor).await
    } else {
        run_many(&cli, &extractor).await
    };
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let (rendered, failures) = outcome?;

    // ── Write output ─────────────────────────────────────────────────────
    if let Some(ref path) = cli.output {
        tokio::fs::write(path, rendered.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        let total = cli.inputs.len();
        let done = total - failures;
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {}/{} documents  {}ms{}",
            if failures == 0 { green("✔") } else { red("✘") },
            done,
            total,
            start.elapsed().as_millis(),
            target,
        );
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Pick the backend from `--replay` / `--endpoint`.
fn build_backend(cli: &Cli) -> Result<Arc<dyn AnalysisBackend>> {
    if !cli.replay.is_empty() {
        let backend = ReplayBackend::from_files(&cli.replay).context("Failed to load replay files")?;
        return Ok(Arc::new(backend));
    }
    if let Some(ref endpoint) = cli.endpoint {
        let backend = HttpBackend::new(endpoint, Duration::from_secs(cli.request_timeout))
            .context("Invalid --endpoint")?;
        return Ok(Arc::new(backend));
    }
    bail!("No analysis backend: pass --replay FILE… or --endpoint URL (or set BLOCKGRAPH_ENDPOINT)")
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_attempts(cli.max_attempts)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_throttle_retries(cli.max_throttle_retries)
        .max_pages(cli.max_pages)
        .duplicate_keys(cli.duplicate_keys.into())
        .download_timeout_secs(cli.download_timeout);

    if let Some(secs) = cli.deadline_secs {
        builder = builder.job_deadline_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_single(cli: &Cli, extractor: &Extractor) -> Result<(String, usize)> {
    let input = &cli.inputs[0];
    let mut document = resolve_input(input, cli.download_timeout)
        .await
        .with_context(|| format!("Failed to resolve {input}"))?;
    if let Some(class) = cli.class {
        document = document.with_class(class.into());
    }
    if let Some(ref loc) = cli.location {
        document = document.with_location(DocumentLocation::parse(loc)?);
    }

    let result = extractor
        .extract(&document)
        .await
        .with_context(|| format!("Extraction failed for {}", document.name))?;
    Ok((render(&result, cli.format)?, 0))
}

async fn run_many(cli: &Cli, extractor: &Extractor) -> Result<(String, usize)> {
    let mut stream = extract_inputs(extractor, cli.inputs.clone(), cli.concurrency);
    let mut items = Vec::with_capacity(cli.inputs.len());
    while let Some(item) = stream.next().await {
        if let Err(ref e) = item.result {
            if !cli.quiet {
                eprintln!("{} {}: {}", red("✗"), item.name, e);
            }
        }
        items.push(item);
    }

    let finished = in_input_order(cli.inputs.len(), items);
    let failures = finished.iter().filter(|r| r.is_err()).count();
    let ordered = cli.inputs.iter().zip(finished.iter());

    let rendered = if cli.format == FormatArg::Json {
        let entries = ordered
            .map(|(input, r)| match r {
                Ok(result) => serde_json::to_value(result)
                    .map(|v| serde_json::json!({ "input": input, "result": v })),
                Err(e) => Ok(serde_json::json!({ "input": input, "error": e })),
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialise output")?;
        format!("{}\n", serde_json::to_string_pretty(&entries)?)
    } else {
        let mut out = String::new();
        for (input, r) in ordered {
            if let Ok(result) = r {
                out.push_str(&format!("==> {input} <==\n"));
                out.push_str(&render(result, cli.format)?);
                out.push('\n');
            }
        }
        out
    };
    Ok((rendered, failures))
}

/// One slot per input, by position, so repeated inputs are not merged.
fn in_input_order(
    total: usize,
    items: Vec<ExtractionItem>,
) -> Vec<std::result::Result<ExtractionResult, String>> {
    let mut slots: Vec<Option<std::result::Result<ExtractionResult, String>>> =
        (0..total).map(|_| None).collect();
    for item in items {
        if let Some(slot) = slots.get_mut(item.index) {
            *slot = Some(item.result.map_err(|e| e.to_string()));
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err("not extracted".to_string())))
        .collect()
}

fn render(result: &ExtractionResult, format: FormatArg) -> Result<String> {
    Ok(match format {
        FormatArg::Text => to_text(result),
        FormatArg::Markdown => to_markdown(result),
        FormatArg::Json => format!(
            "{}\n",
            serde_json::to_string_pretty(result).context("Failed to serialise output")?
        ),
    })
}
