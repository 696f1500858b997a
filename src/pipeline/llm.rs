//! Model interaction: send the document and the instruction prompt to the
//! extraction model and return its raw text.
//!
//! The prompt lives in [`crate::prompts`] and answer handling in
//! [`crate::pipeline::parse`]. There is no retry here: a failed model call
//! ends the run with [`ExtractError::ModelInvocation`] and callers decide
//! whether to resubmit the whole document.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ModelError};
use crate::output::{RawModelAnswer, RetrievedDocument};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// External structured-extraction model.
///
/// Configured once per process and shared by all in-flight runs, hence
/// `Send + Sync`.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Submit `prompt` together with the document and return the model's text.
    async fn generate(&self, prompt: &str, document: &RetrievedDocument)
        -> Result<String, ModelError>;
}

/// [`ExtractionModel`] backed by any edgequake-llm vision provider.
pub struct LlmExtractionModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmExtractionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl ExtractionModel for LlmExtractionModel {
    /// ## Message Layout
    ///
    /// A single user message: the instruction text plus the document as an
    /// inline base64 attachment. Sending PDFs through the image slot works
    /// for providers that accept `application/pdf` inline data (Gemini).
    async fn generate(
        &self,
        prompt: &str,
        document: &RetrievedDocument,
    ) -> Result<String, ModelError> {
        let messages = vec![ChatMessage::user_with_images(
            prompt,
            vec![encode_document(document)],
        )];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ModelError::new(e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Wrap document bytes as a base64 attachment with the classified mime type.
pub fn encode_document(document: &RetrievedDocument) -> ImageData {
    let b64 = STANDARD.encode(&document.bytes);
    debug!(
        "Encoded {} document → {} bytes base64",
        document.mime_type,
        b64.len()
    );
    ImageData::new(b64, document.mime_type.as_str())
}

/// Call the model once. No retries.
pub async fn invoke(
    model: &dyn ExtractionModel,
    document: &RetrievedDocument,
    prompt: &str,
) -> Result<RawModelAnswer, ExtractError> {
    let start = Instant::now();
    match model.generate(prompt, document).await {
        Ok(text) => {
            debug!(
                "Model answered {} chars in {:?}",
                text.len(),
                start.elapsed()
            );
            Ok(RawModelAnswer(text))
        }
        Err(e) => {
            warn!(stage = "invoke", "Extraction model call failed: {}", e);
            Err(ExtractError::ModelInvocation { message: e.message })
        }
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
