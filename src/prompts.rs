//! Instruction prompt for clinical report extraction.
//!
//! The JSON shape requested here and the shape decoded by
//! [`crate::report::ExtractedReport`] must stay in lock-step.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Version tag of [`EXTRACTION_PROMPT`]. Bump when the requested shape changes.
pub const PROMPT_VERSION: &str = "report-extract/v1";

/// Default instruction sent alongside the document bytes.
pub const EXTRACTION_PROMPT: &str = r#"You are a medical document analyst. Read the attached clinical document (a scanned image or a PDF) and extract its contents into a single JSON object.

Return JSON with exactly this structure:
{
  "reportType": "lab" | "pathology" | "radiology" | "cardiology" | "other",
  "title": "short descriptive title of the report",
  "reportDate": "YYYY-MM-DD",
  "provider": {
    "name": "facility or physician name",
    "address": "full address",
    "phone": "phone number"
  },
  "patientHint": {
    "name": "patient name",
    "dob": "YYYY-MM-DD",
    "mrn": "medical record number"
  },
  "findings": "detailed findings as written in the report",
  "conclusion": "impression, conclusion or summary",
  "labValues": [
    {
      "testName": "name of the test",
      "value": "measured value",
      "unit": "unit of measure",
      "referenceRange": "normal range as printed",
      "flag": "H" | "L" | null
    }
  ],
  "diagnoses": ["diagnosis"],
  "recommendations": ["recommendation"],
  "medications": ["medication with dose"],
  "loincCode": "LOINC code if printed"
}

Rules:
- Use null for any field that is unknown or not present in the document.
- Extract only information that is clearly present. Do NOT guess, infer, or fabricate values.
- Copy lab values, units and reference ranges exactly as printed.
- Set "flag" to "H" or "L" only when the document marks the value as high or low.
- Respond with the JSON object only."#;
