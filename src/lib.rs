//! # edgequake-report-extract
//!
//! Turn a clinical document (scanned image or PDF) referenced by a URL into a
//! validated, strongly-typed report record using a Vision Language Model.
//!
//! ## Scope
//!
//! Report forms are tedious to fill in by hand from a lab printout or a
//! radiology letter. A VLM can read the document like a human would, but its
//! answer is free text that merely *contains* JSON, and the document URL it
//! needs may have expired. This crate owns the narrow, failure-prone middle:
//! fetching bytes despite stale storage links, calling the model, and turning
//! its loose answer into a record with no missing keys.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Access     direct read; on rejection sign the storage key and retry once
//!  ├─ 2. Mime       content-type header, else caller hint
//!  ├─ 3. Invoke     prompt + bytes → extraction model (no retries)
//!  ├─ 4. Parse      first `{` … last `}` → ExtractedReport (lenient fields)
//!  └─ 5. Normalize  defaults filled → NormalizedFormRecord
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_report_extract::{extract, DocumentKind, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract("https://example.com/cbc.pdf", DocumentKind::Pdf, &config).await?;
//!     println!("{} on {}", output.form_data.title, output.form_data.report_date);
//!     Ok(())
//! }
//! ```
//!
//! ## Testing with fakes
//!
//! [`Extractor::new`] takes the transport, signing service and model as
//! trait objects, so a test can script every collaborator and assert exactly
//! how many reads and signing calls a run made.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report-extract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod signing;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, SigningConfig};
pub use error::{ExtractError, FailureCategory, ModelError, ParseFailure, SignError, TransportError};
pub use extract::{extract, extract_sync, write_response, Extractor};
pub use output::{
    DocumentKind, DocumentReference, ExtractionOutput, ExtractionRequest, ExtractionResponse,
    ExtractionStats, HandledResponse, NormalizedFormRecord, RawModelAnswer, RetrievedDocument,
};
pub use pipeline::llm::{ExtractionModel, LlmExtractionModel};
pub use pipeline::Stage;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{ExtractedReport, LabFlag, LabValue, PatientHint, ProviderInfo, ReportType};
pub use signing::{NoSigning, SigningService, StorageSigner};
pub use transport::{log_safe_url, ByteTransport, FetchResponse, HttpTransport};
