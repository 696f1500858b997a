//! Error types for the edgequake-report-extract library.
//!
//! Errors fall into two layers:
//!
//! * [`ExtractError`]: fatal for one run. The pipeline stopped at a
//!   specific stage (validation, retrieval, model call, parse). Returned as
//!   `Err(ExtractError)` from [`crate::extract::Extractor::extract`] and
//!   mapped to the `{ "error": ... }` response shape by
//!   [`crate::extract::Extractor::handle`].
//!
//! * Collaborator errors ([`TransportError`], [`SignError`], [`ModelError`])
//!   returned by the injected transport, signing service, and model client.
//!   The pipeline folds them into the matching `ExtractError` variant so
//!   callers only ever match on one enum.
//!
//! Every `ExtractError` carries a [`FailureCategory`] (client vs. server) and
//! a stage name so logs and telemetry can tell "model unreachable" apart from
//! "model answered with garbage".

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a pipeline run.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required request field was missing or blank.
    #[error("Missing required field '{field}'")]
    Validation { field: &'static str },

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// The document could not be read, even after the signed retry.
    #[error("Failed to fetch '{url}': {reason}")]
    Retrieval { url: String, reason: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The extraction model call itself failed (network, quota, auth, …).
    #[error("Extraction model call failed: {message}")]
    ModelInvocation { message: String },

    /// The model answered but the answer holds no usable JSON.
    #[error("Could not parse model answer: {0}")]
    Parse(#[from] ParseFailure),

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why the model answer could not be turned into a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// No `{ … }` span exists anywhere in the answer.
    #[error("no JSON found")]
    NoJson,

    /// A `{ … }` span exists but is not valid JSON.
    #[error("malformed JSON: {detail}")]
    MalformedJson { detail: String },
}

/// Who is at fault for a failed run.
///
/// Hosting request handlers use this to pick a 4xx vs. 5xx status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    /// Bad input or an unreadable document URL.
    Client,
    /// Model unreachable, unusable model output, or misconfiguration.
    Server,
}

impl FailureCategory {
    /// HTTP status code conventionally associated with the category.
    pub fn status_code(self) -> u16 {
        match self {
            FailureCategory::Client => 400,
            FailureCategory::Server => 500,
        }
    }
}

impl ExtractError {
    /// Failure category used to choose the response status.
    pub fn category(&self) -> FailureCategory {
        match self {
            ExtractError::Validation { .. } | ExtractError::Retrieval { .. } => {
                FailureCategory::Client
            }
            _ => FailureCategory::Server,
        }
    }

    /// Name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ExtractError::Validation { .. } => "validate",
            ExtractError::Retrieval { .. } => "retrieve",
            ExtractError::ModelInvocation { .. } => "invoke",
            ExtractError::Parse(_) => "parse",
            ExtractError::ProviderNotConfigured { .. } | ExtractError::InvalidConfig(_) => "setup",
            ExtractError::OutputWriteFailed { .. } => "output",
            ExtractError::Internal(_) => "internal",
        }
    }

    /// Message placed in the `{ "error": ... }` response body.
    ///
    /// Retrieval and model errors stay generic: the detailed
    /// `Display` text can contain storage URLs and provider responses that
    /// belong in logs, not in client responses.
    pub fn public_message(&self) -> String {
        match self {
            ExtractError::Validation { field } => format!("{field} is required"),
            ExtractError::Retrieval { .. } => "Failed to fetch file".to_string(),
            ExtractError::ModelInvocation { .. } => "Failed to process document with AI".to_string(),
            ExtractError::Parse(_) => "Failed to parse AI response".to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure of a single network read, before any HTTP status was received.
#[derive(Debug, Clone, Error)]
#[error("Request to '{url}' failed: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
    pub timed_out: bool,
}

/// Failure of the storage signing collaborator.
#[derive(Debug, Clone, Error)]
pub enum SignError {
    /// No signing backend is configured for this process.
    #[error("storage signing is not configured")]
    NotConfigured,

    /// The signing endpoint answered with a non-success status.
    #[error("signing rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The signing request could not be sent.
    #[error("signing request failed: {0}")]
    Request(String),

    /// The signing endpoint answered without a usable URL.
    #[error("signing response unusable: {0}")]
    MalformedResponse(String),
}

/// Failure reported by an [`crate::pipeline::llm::ExtractionModel`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_client_error() {
        let e = ExtractError::Validation { field: "fileUrl" };
        assert_eq!(e.category(), FailureCategory::Client);
        assert_eq!(e.stage(), "validate");
        assert_eq!(e.public_message(), "fileUrl is required");
    }

    #[test]
    fn retrieval_hides_url_from_client() {
        let e = ExtractError::Retrieval {
            url: "https://store/doc1?token=secret".into(),
            reason: "HTTP 403 Forbidden".into(),
        };
        assert_eq!(e.category(), FailureCategory::Client);
        assert_eq!(e.category().status_code(), 400);
        assert_eq!(e.public_message(), "Failed to fetch file");
        assert!(e.to_string().contains("HTTP 403"));
    }

    #[test]
    fn model_and_parse_are_distinct_server_errors() {
        let model = ExtractError::ModelInvocation {
            message: "quota exceeded".into(),
        };
        let parse = ExtractError::from(ParseFailure::NoJson);
        assert_eq!(model.category(), FailureCategory::Server);
        assert_eq!(parse.category(), FailureCategory::Server);
        assert_ne!(model.stage(), parse.stage());
        assert_ne!(model.public_message(), parse.public_message());
    }

    #[test]
    fn parse_failure_display() {
        assert_eq!(ParseFailure::NoJson.to_string(), "no JSON found");
        let e = ParseFailure::MalformedJson {
            detail: "EOF while parsing".into(),
        };
        assert!(e.to_string().starts_with("malformed JSON"));
    }

    #[test]
    fn sign_error_display() {
        let e = SignError::Rejected {
            status: 404,
            body: "Object not found".into(),
        };
        assert!(e.to_string().contains("404"));
        assert!(e.to_string().contains("Object not found"));
    }
}
