//! Configuration types for clinical report extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is resolved once per
//! process into an [`crate::extract::Extractor`], whose collaborators (model
//! client, signing service, transport) are then shared by every run.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default model when a provider is named without one.
///
/// Gemini models accept `application/pdf` inline data as well as images,
/// which the extraction pipeline relies on for PDF documents.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for report extraction.
///
/// # Example
/// ```rust
/// use edgequake_report_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .provider_name("gemini")
///     .model("gemini-2.0-flash")
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription, not composition: a low temperature keeps
    /// the model close to what is printed on the page.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// Lab panels with dozens of rows produce long JSON; a truncated answer
    /// fails to parse.
    pub max_tokens: usize,

    /// Custom instruction prompt. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub system_prompt: Option<String>,

    /// Timeout for each document read in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Maximum concurrent runs in [`crate::extract::Extractor::extract_many`]. Default: 4.
    pub concurrency: usize,

    /// Storage signing endpoint used to recover from rejected reads.
    /// If None, [`SigningConfig::from_env`] is consulted; if that is also
    /// None, recovery is disabled.
    pub signing: Option<SigningConfig>,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            system_prompt: None,
            download_timeout_secs: 120,
            concurrency: 4,
            signing: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("signing", &self.signing)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
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
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn signing(mut self, signing: SigningConfig) -> Self {
        self.config.signing = Some(signing);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.download_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "download_timeout_secs must be ≥ 1".into(),
            ));
        }
        if let Some(ref s) = c.signing {
            s.validate()?;
        }
        Ok(self.config)
    }
}

// ── Signing ──────────────────────────────────────────────────────────────

/// Connection details for the storage signing endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Storage project base URL, e.g. `https://proj.storage.example`.
    pub base_url: String,
    /// Service credential allowed to sign objects in `bucket`.
    pub service_key: String,
    /// Bucket holding report documents.
    pub bucket: String,
    /// Lifetime of minted URLs in seconds. Default: 3600.
    pub expires_in_secs: u64,
}

impl SigningConfig {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            service_key: service_key.into(),
            bucket: bucket.into(),
            expires_in_secs: 3600,
        }
    }

    pub fn expires_in_secs(mut self, secs: u64) -> Self {
        self.expires_in_secs = secs;
        self
    }

    /// Read `STORAGE_URL`, `STORAGE_SERVICE_KEY`, `STORAGE_BUCKET` and the
    /// optional `STORAGE_SIGNED_URL_TTL`. Returns None if any required
    /// variable is missing or empty.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let config = Self::new(
            var("STORAGE_URL")?,
            var("STORAGE_SERVICE_KEY")?,
            var("STORAGE_BUCKET")?,
        );
        let ttl = var("STORAGE_SIGNED_URL_TTL").and_then(|v| v.trim().parse().ok());
        Some(match ttl {
            Some(secs) => config.expires_in_secs(secs),
            None => config,
        })
    }

    fn validate(&self) -> Result<(), ExtractError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ExtractError::InvalidConfig(format!(
                "Storage URL must be http(s), got '{}'",
                self.base_url
            )));
        }
        if self.bucket.is_empty() || self.bucket.contains('/') {
            return Err(ExtractError::InvalidConfig(format!(
                "Invalid storage bucket '{}'",
                self.bucket
            )));
        }
        if self.expires_in_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Signed URL lifetime must be ≥ 1 second".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}
