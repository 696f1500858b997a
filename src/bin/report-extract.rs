//! CLI binary for edgequake-report-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one pipeline per URL, and prints the entry-point
//! response JSON (`{ success, formData, rawExtraction }` or `{ error }`).

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_report_extract::{
    log_safe_url, write_response, DocumentKind, DocumentReference, ExtractionConfig,
    ExtractionProgressCallback, ExtractionResponse, Extractor, ProgressCallback, SigningConfig,
    Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current stage, plus one log line per finished run.
/// Runs may finish out of order when several URLs are given.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos}/{len}  {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, url: &str, stage: Stage) {
        let what = match stage {
            Stage::Retrieve => "fetching document",
            Stage::Invoke => "waiting for model",
            Stage::Parse => "parsing answer",
            Stage::Normalize => "normalising",
        };
        self.bar.set_message(format!("{what}  {}", dim(log_safe_url(url))));
    }

    fn on_extraction_error(&self, url: &str, stage: &str, error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  [{stage}] {}", red("✗"), log_safe_url(url), red(&msg)));
    }

    fn on_extraction_complete(&self, url: &str, success: bool) {
        if success {
            self.bar.println(format!("  {} {}", green("✓"), log_safe_url(url)));
        }
        self.bar.inc(1);
        if self.bar.position() >= self.bar.length().unwrap_or(0) {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a lab report PDF (JSON on stdout)
  report-extract --type pdf https://example.com/cbc.pdf

  # Scanned image, write result to a file
  report-extract https://example.com/scan.jpg -o report.json

  # Several documents, 8 at a time
  report-extract -c 8 --type pdf https://h/a.pdf https://h/b.pdf https://h/c.pdf

  # Recover expired storage links by re-signing them
  STORAGE_URL=https://proj.storage.example STORAGE_SERVICE_KEY=... STORAGE_BUCKET=reports \
    report-extract https://proj.storage.example/storage/v1/object/sign/reports/u1/a.pdf?token=old

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (preferred: reads PDFs natively)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  STORAGE_URL             Storage base URL used to re-sign rejected document URLs
  STORAGE_SERVICE_KEY     Storage service credential
  STORAGE_BUCKET          Bucket holding report documents
  STORAGE_SIGNED_URL_TTL  Lifetime of re-signed URLs in seconds (default 3600)
"#;

/// Extract structured clinical reports from document URLs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "report-extract",
    version,
    about = "Extract structured clinical reports from document URLs using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTTP/HTTPS URLs of scanned images or PDFs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Document type hint, used when the server sends no usable content type.
    #[arg(long = "type", env = "REPORT_EXTRACT_TYPE", value_enum, default_value = "image")]
    kind: KindArg,

    /// Write the response JSON to this file instead of stdout (single URL only).
    #[arg(short, long, env = "REPORT_EXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "REPORT_EXTRACT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "REPORT_EXTRACT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Number of documents processed concurrently.
    #[arg(short, long, env = "REPORT_EXTRACT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "REPORT_EXTRACT_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "REPORT_EXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Storage base URL for re-signing rejected document URLs.
    #[arg(long, env = "STORAGE_URL")]
    storage_url: Option<String>,

    /// Storage service credential.
    #[arg(long, env = "STORAGE_SERVICE_KEY", hide_env_values = true)]
    storage_key: Option<String>,

    /// Storage bucket holding report documents.
    #[arg(long, env = "STORAGE_BUCKET")]
    storage_bucket: Option<String>,

    /// Lifetime of re-signed URLs in seconds.
    #[arg(long, env = "STORAGE_SIGNED_URL_TTL", default_value_t = 3600)]
    signed_url_ttl: u64,

    /// Print single-line JSON.
    #[arg(long)]
    compact: bool,

    /// Disable progress spinner.
    #[arg(long, env = "REPORT_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REPORT_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the JSON result and errors.
    #[arg(short, long, env = "REPORT_EXTRACT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum KindArg {
    Image,
    Pdf,
}

impl From<KindArg> for DocumentKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Image => DocumentKind::Image,
            KindArg::Pdf => DocumentKind::Pdf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports progress; keep library logs to errors
    // while it is active.
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

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output accepts a single URL, got {}", cli.inputs.len());
    }

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(cli.inputs.len()) as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress).await?;
    let extractor = Extractor::from_config(&config).context("Failed to set up extractor")?;

    let kind: DocumentKind = cli.kind.clone().into();
    let docs: Vec<DocumentReference> = cli
        .inputs
        .iter()
        .map(|url| DocumentReference::new(url.as_str(), kind))
        .collect();

    // ── Single URL to file ───────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = match extractor.extract_to_file(&docs[0], output_path).await {
            Ok(stats) => stats,
            Err(e) => {
                write_response(output_path, &ExtractionResponse::failure(&e))
                    .await
                    .context("Failed to write error response")?;
                if !cli.quiet {
                    eprintln!("{} {}  →  {}", red("✘"), e, output_path.display());
                }
                std::process::exit(1);
            }
        };
        if !cli.quiet {
            eprintln!(
                "{}  {} ({} bytes{})  {}ms  →  {}",
                green("✔"),
                stats.mime_type,
                stats.document_bytes,
                if stats.signed_retry { ", re-signed" } else { "" },
                stats.total_duration_ms,
                output_path.display(),
            );
        }
        return Ok(());
    }

    // ── One or more URLs to stdout ───────────────────────────────────────
    let results = extractor.extract_many(&docs).await;
    let failed = results.iter().filter(|r| r.is_err()).count();

    let responses: Vec<ExtractionResponse> = results
        .into_iter()
        .map(|r| match r {
            Ok(output) => output.into_response(),
            Err(e) => ExtractionResponse::failure(&e),
        })
        .collect();

    let json = match (responses.as_slice(), cli.compact) {
        ([single], true) => serde_json::to_string(single),
        ([single], false) => serde_json::to_string_pretty(single),
        (all, true) => serde_json::to_string(all),
        (all, false) => serde_json::to_string_pretty(all),
    }
    .context("Failed to serialise output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;
    handle.flush().ok();
    drop(handle);

    if failed > 0 {
        if !cli.quiet {
            eprintln!("{} {}/{} extractions failed", red("✘"), failed, docs.len());
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }

    match (&cli.storage_url, &cli.storage_key, &cli.storage_bucket) {
        (Some(url), Some(key), Some(bucket)) => {
            builder = builder.signing(
                SigningConfig::new(url, key, bucket).expires_in_secs(cli.signed_url_ttl),
            );
        }
        (None, None, None) => {}
        _ => anyhow::bail!(
            "Storage signing needs all of --storage-url, --storage-key and --storage-bucket"
        ),
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
