//! Pipeline entry points.
//!
//! An [`Extractor`] owns the three process-wide collaborators (byte
//! transport, signing service, extraction model) behind `Arc`s, so one
//! extractor can serve any number of concurrent runs. Each run is a strict
//! sequence (retrieve → invoke → parse → normalize) with no shared mutable
//! state, no caching, and no cancellation: callers that want a deadline wrap
//! the call in `tokio::time::timeout`.

use crate::config::{ExtractionConfig, SigningConfig, DEFAULT_MODEL};
use crate::error::ExtractError;
use crate::output::{
    DocumentKind, DocumentReference, ExtractionOutput, ExtractionRequest, ExtractionResponse,
    ExtractionStats, HandledResponse,
};
use crate::pipeline::llm::{ExtractionModel, LlmExtractionModel};
use crate::pipeline::{access, llm, normalize, parse, Stage};
use crate::progress::ProgressCallback;
use crate::prompts::EXTRACTION_PROMPT;
use crate::signing::{NoSigning, SigningService, StorageSigner};
use crate::transport::{log_safe_url, ByteTransport, HttpTransport};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the extraction pipeline against injected collaborators.
#[derive(Clone)]
pub struct Extractor {
    transport: Arc<dyn ByteTransport>,
    signer: Arc<dyn SigningService>,
    model: Arc<dyn ExtractionModel>,
    prompt: String,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Extractor {
    /// Build an extractor from explicit collaborators and default settings.
    pub fn new(
        transport: Arc<dyn ByteTransport>,
        signer: Arc<dyn SigningService>,
        model: Arc<dyn ExtractionModel>,
    ) -> Self {
        let defaults = ExtractionConfig::default();
        Self {
            transport,
            signer,
            model,
            prompt: EXTRACTION_PROMPT.to_string(),
            concurrency: defaults.concurrency,
            progress: None,
        }
    }

    /// Apply prompt override, batch concurrency and progress callback from `config`.
    pub fn with_config(mut self, config: &ExtractionConfig) -> Self {
        if let Some(ref prompt) = config.system_prompt {
            self.prompt = prompt.clone();
        }
        self.concurrency = config.concurrency.max(1);
        self.progress = config.progress_callback.clone();
        self
    }

    /// Build the production collaborators described by `config`.
    ///
    /// * transport: reqwest with `download_timeout_secs`
    /// * signer: `config.signing`, else [`SigningConfig::from_env`], else disabled
    /// * model: provider resolved by [`resolve_provider`]
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let transport = HttpTransport::new(config.download_timeout_secs)
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {}", e.reason)))?;

        let signer: Arc<dyn SigningService> =
            match config.signing.clone().or_else(SigningConfig::from_env) {
                Some(signing) => {
                    debug!("Storage signing enabled for bucket '{}'", signing.bucket);
                    Arc::new(
                        StorageSigner::new(signing)
                            .map_err(|e| ExtractError::Internal(e.to_string()))?,
                    )
                }
                None => {
                    debug!("Storage signing not configured; rejected reads will not be retried");
                    Arc::new(NoSigning)
                }
            };

        let provider = resolve_provider(config)?;
        let model = LlmExtractionModel::new(provider, config);

        Ok(Self::new(Arc::new(transport), signer, Arc::new(model)).with_config(config))
    }

    /// Run the pipeline for one document.
    pub async fn extract(&self, doc: &DocumentReference) -> Result<ExtractionOutput, ExtractError> {
        if let Some(ref cb) = self.progress {
            cb.on_extraction_start(&doc.url);
        }

        let result = self.run(doc).await;

        match &result {
            Ok(output) => info!(
                "Extracted '{}' ({}) from {} in {}ms",
                output.form_data.title,
                output.form_data.report_type.as_str(),
                log_safe_url(&doc.url),
                output.stats.total_duration_ms
            ),
            Err(e) => {
                warn!(stage = e.stage(), "Extraction of {} failed: {}", log_safe_url(&doc.url), e);
                if let Some(ref cb) = self.progress {
                    cb.on_extraction_error(&doc.url, e.stage(), &e.to_string());
                }
            }
        }
        if let Some(ref cb) = self.progress {
            cb.on_extraction_complete(&doc.url, result.is_ok());
        }
        result
    }

    async fn run(&self, doc: &DocumentReference) -> Result<ExtractionOutput, ExtractError> {
        let total_start = Instant::now();

        // ── Step 1: Retrieve bytes (+ mime) ──────────────────────────────
        self.stage(doc, Stage::Retrieve);
        let fetch_start = Instant::now();
        let resolved = access::resolve(doc, self.transport.as_ref(), self.signer.as_ref()).await?;
        let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

        // ── Step 2: Model call ───────────────────────────────────────────
        self.stage(doc, Stage::Invoke);
        let model_start = Instant::now();
        let answer = llm::invoke(self.model.as_ref(), &resolved.document, &self.prompt).await?;
        let model_duration_ms = model_start.elapsed().as_millis() as u64;

        let mut stats = ExtractionStats {
            mime_type: resolved.document.mime_type.clone(),
            document_bytes: resolved.document.bytes.len(),
            signed_retry: resolved.signed_retry,
            answer_bytes: answer.as_str().len(),
            fetch_duration_ms,
            model_duration_ms,
            total_duration_ms: 0,
        };
        // Document bytes are not needed past the model call.
        drop(resolved);

        // ── Step 3: Parse ────────────────────────────────────────────────
        self.stage(doc, Stage::Parse);
        let raw_extraction = parse::parse(&answer)?;

        // ── Step 4: Normalize ────────────────────────────────────────────
        self.stage(doc, Stage::Normalize);
        let form_data = normalize::normalize(&raw_extraction);

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(ExtractionOutput {
            form_data,
            raw_extraction,
            stats,
        })
    }

    fn stage(&self, doc: &DocumentReference, stage: Stage) {
        debug!("{}: {}", log_safe_url(&doc.url), stage);
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(&doc.url, stage);
        }
    }

    /// Handle an entry-point request: validate, run, and shape the response.
    ///
    /// Never returns `Err`; failures become `{ "error": ... }` with a 4xx/5xx
    /// status chosen from [`crate::error::FailureCategory`].
    pub async fn handle(&self, request: &ExtractionRequest) -> HandledResponse {
        let result = match request.validate() {
            Ok(doc) => self.extract(&doc).await,
            Err(e) => {
                warn!(stage = e.stage(), "Rejected extraction request: {}", e);
                Err(e)
            }
        };

        match result {
            Ok(output) => HandledResponse {
                status: 200,
                category: None,
                body: output.into_response(),
            },
            Err(e) => HandledResponse {
                status: e.category().status_code(),
                category: Some(e.category()),
                body: ExtractionResponse::failure(&e),
            },
        }
    }

    /// Run independent pipelines concurrently, up to the configured
    /// concurrency. Results are returned in input order.
    pub async fn extract_many(
        &self,
        docs: &[DocumentReference],
    ) -> Vec<Result<ExtractionOutput, ExtractError>> {
        info!(
            "Extracting {} documents ({} concurrent)",
            docs.len(),
            self.concurrency
        );
        stream::iter(docs.iter().map(|doc| self.extract(doc)))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Run the pipeline and write the success response JSON to `output_path`.
    ///
    /// Nothing is written when the run fails; see [`write_response`].
    pub async fn extract_to_file(
        &self,
        doc: &DocumentReference,
        output_path: impl AsRef<Path>,
    ) -> Result<ExtractionStats, ExtractError> {
        let output = self.extract(doc).await?;
        let stats = output.stats.clone();
        write_response(output_path, &output.into_response()).await?;
        Ok(stats)
    }
}

/// Write a response body (success or `{ error }`) as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
/// Missing parent directories are created.
pub async fn write_response(
    output_path: impl AsRef<Path>,
    response: &ExtractionResponse,
) -> Result<(), ExtractError> {
    let path = output_path.as_ref();
    let json = serde_json::to_vec_pretty(response)
        .map_err(|e| ExtractError::Internal(format!("serialise output: {e}")))?;

    let write_err = |source| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Extract a report from `url` using collaborators built from `config`.
///
/// # Example
/// ```rust,no_run
/// use edgequake_report_extract::{extract, DocumentKind, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let output = extract("https://example.com/cbc.pdf", DocumentKind::Pdf, &config).await?;
/// println!("{}", output.form_data.title);
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    url: impl AsRef<str>,
    kind: DocumentKind,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let extractor = Extractor::from_config(config)?;
    extractor
        .extract(&DocumentReference::new(url.as_ref(), kind))
        .await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    url: impl AsRef<str>,
    kind: DocumentKind,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(url, kind, config))
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Model used when a provider is named without an explicit model.
fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openai" | "azure" => "gpt-4.1-mini",
        "anthropic" => "claude-sonnet-4-20250514",
        _ => DEFAULT_MODEL,
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or the
///    provider's default model.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`GEMINI_API_KEY`**. Gemini reads PDFs natively and is tried
///    before other detected keys.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(default_model_for(name));
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
