//! Pipeline inputs, intermediate values, and output records.
//!
//! ```text
//! ExtractionRequest ─validate─▶ DocumentReference ─resolve─▶ RetrievedDocument
//!        ─invoke─▶ RawModelAnswer ─parse─▶ ExtractedReport ─normalize─▶ NormalizedFormRecord
//! ```
//!
//! Everything here lives for exactly one pipeline run; nothing is cached.

use crate::error::{ExtractError, FailureCategory};
use crate::report::{ExtractedReport, ReportType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What the caller says the document is. Only a fallback for mime detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Image,
    Pdf,
}

impl DocumentKind {
    /// `"pdf"` (any case) is a PDF; everything else is treated as an image.
    pub fn from_hint(hint: &str) -> Self {
        if hint.trim().eq_ignore_ascii_case("pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Image
        }
    }
}

/// Immutable pipeline input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub url: String,
    pub kind: DocumentKind,
}

impl DocumentReference {
    pub fn new(url: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// Document bytes plus the mime type the model should be told.
#[derive(Clone, PartialEq, Eq)]
pub struct RetrievedDocument {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for RetrievedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievedDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Free text returned by the extraction model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelAnswer(pub String);

impl RawModelAnswer {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Flat projection of a report used to auto-fill the report form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFormRecord {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub title: String,
    pub report_date: NaiveDate,
    pub provider_name: Option<String>,
    pub provider_address: Option<String>,
    pub provider_phone: Option<String>,
    pub findings: Option<String>,
    pub conclusion: Option<String>,
    pub extracted_data: ExtractedReport,
}

/// Timing and size facts about one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Mime type the document was sent as.
    pub mime_type: String,
    /// Size of the retrieved document.
    pub document_bytes: usize,
    /// `true` when the document was only readable through a signed URL.
    pub signed_retry: bool,
    /// Length of the raw model answer in bytes.
    pub answer_bytes: usize,
    pub fetch_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Successful pipeline result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutput {
    pub form_data: NormalizedFormRecord,
    /// The parsed model answer before defaults were applied.
    pub raw_extraction: ExtractedReport,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// The `{ success: true, formData, rawExtraction }` response body.
    pub fn into_response(self) -> ExtractionResponse {
        ExtractionResponse::Success {
            success: true,
            form_data: self.form_data,
            raw_extraction: self.raw_extraction,
        }
    }
}

/// Entry-point request as received from the request-handling layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

impl ExtractionRequest {
    pub fn new(file_url: impl Into<String>, file_type: Option<&str>) -> Self {
        Self {
            file_url: Some(file_url.into()),
            file_type: file_type.map(str::to_string),
        }
    }

    /// Check required fields and build the pipeline input.
    pub fn validate(&self) -> Result<DocumentReference, ExtractError> {
        let url = self
            .file_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ExtractError::Validation { field: "fileUrl" })?;
        let kind = self
            .file_type
            .as_deref()
            .map(DocumentKind::from_hint)
            .unwrap_or_default();
        Ok(DocumentReference::new(url, kind))
    }
}

/// Entry-point response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractionResponse {
    Success {
        success: bool,
        #[serde(rename = "formData")]
        form_data: NormalizedFormRecord,
        #[serde(rename = "rawExtraction")]
        raw_extraction: ExtractedReport,
    },
    Failure { error: String },
}

impl ExtractionResponse {
    pub fn failure(err: &ExtractError) -> Self {
        ExtractionResponse::Failure {
            error: err.public_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResponse::Success { .. })
    }
}

/// A response together with the failure category that produced it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct HandledResponse {
    pub status: u16,
    pub category: Option<FailureCategory>,
    pub body: ExtractionResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_requires_file_url() {
        let missing = ExtractionRequest::default();
        assert!(matches!(
            missing.validate(),
            Err(ExtractError::Validation { field: "fileUrl" })
        ));

        let blank = ExtractionRequest::new("   ", None);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn request_file_type_defaults_to_image() {
        let doc = ExtractionRequest::new("https://store/doc1", None)
            .validate()
            .unwrap();
        assert_eq!(doc.kind, DocumentKind::Image);

        let doc = ExtractionRequest::new("https://store/doc1", Some("PDF"))
            .validate()
            .unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
    }

    #[test]
    fn request_deserialises_camel_case() {
        let req: ExtractionRequest =
            serde_json::from_value(json!({"fileUrl": "https://store/a", "fileType": "pdf"}))
                .unwrap();
        assert_eq!(req.file_url.as_deref(), Some("https://store/a"));
        assert_eq!(req.file_type.as_deref(), Some("pdf"));
    }

    #[test]
    fn failure_response_shape() {
        let body = ExtractionResponse::failure(&ExtractError::Validation { field: "fileUrl" });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"error": "fileUrl is required"})
        );
    }

    #[test]
    fn retrieved_document_debug_hides_bytes() {
        let doc = RetrievedDocument {
            bytes: vec![0u8; 2048],
            mime_type: "image/png".into(),
        };
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("<2048 bytes>"));
        assert!(dbg.contains("image/png"));
    }
}
