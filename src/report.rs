//! The clinical report schema requested from the extraction model.
//!
//! [`ExtractedReport`] is the *intermediate* record: every field is optional
//! and decodes independently. Models regularly return a number where a string
//! was asked for, an unknown `reportType`, or an empty string instead of
//! `null`; none of that should sink an otherwise useful answer. A field whose
//! JSON value does not fit simply decodes as `None`, and
//! [`crate::pipeline::normalize`] later fills the defaults.
//!
//! All `Option` fields serialise as explicit `null`, never as a missing key,
//! so downstream consumers can treat the record as total.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broad category of a clinical report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Lab,
    Pathology,
    Radiology,
    Cardiology,
    #[default]
    Other,
}

impl ReportType {
    /// Parse a model-supplied label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "lab" | "laboratory" => Some(ReportType::Lab),
            "pathology" => Some(ReportType::Pathology),
            "radiology" | "imaging" => Some(ReportType::Radiology),
            "cardiology" => Some(ReportType::Cardiology),
            "other" => Some(ReportType::Other),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Lab => "lab",
            ReportType::Pathology => "pathology",
            ReportType::Radiology => "radiology",
            ReportType::Cardiology => "cardiology",
            ReportType::Other => "other",
        }
    }
}

/// High/low marker printed next to an out-of-range lab value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabFlag {
    H,
    L,
}

impl LabFlag {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "h" | "high" => Some(LabFlag::H),
            "l" | "low" => Some(LabFlag::L),
            _ => None,
        }
    }
}

/// Issuing facility or physician.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
}

/// Patient identifiers as printed on the document.
///
/// Only a hint: the caller matches it against its own patient records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientHint {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub dob: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mrn: Option<String>,
}

/// One row of a lab result table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabValue {
    #[serde(default, deserialize_with = "lenient_text")]
    pub test_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reference_range: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub flag: Option<LabFlag>,
}

/// Structured content the model extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedReport {
    #[serde(default, deserialize_with = "lenient_report_type")]
    pub report_type: Option<ReportType>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub report_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub provider: Option<ProviderInfo>,
    #[serde(default, deserialize_with = "lenient")]
    pub patient_hint: Option<PatientHint>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub findings: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub conclusion: Option<String>,
    #[serde(default, deserialize_with = "lenient_lab_values")]
    pub lab_values: Option<Vec<LabValue>>,
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub diagnoses: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub recommendations: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub medications: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub loinc_code: Option<String>,
}

/// Names models use for the patient block, canonical first.
const PATIENT_KEYS: [&str; 3] = ["patientHint", "patient", "patientInfo"];

impl ExtractedReport {
    /// Decode a JSON value produced by the model.
    ///
    /// The patient block is accepted as `patientHint`, `patient` or
    /// `patientInfo`; the first non-null one is kept as `patientHint` and the
    /// rest are dropped.
    pub fn from_json(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(ref mut map) = value {
            let found: Vec<Value> = PATIENT_KEYS
                .iter()
                .filter_map(|key| map.remove(*key))
                .collect();
            if let Some(patient) = found.into_iter().find(|v| !v.is_null()) {
                map.insert("patientHint".to_string(), patient);
            }
        }
        serde_json::from_value(value)
    }
}

// ── Lenient field decoders ───────────────────────────────────────────────
//
// Each decoder first reads an arbitrary JSON value (which cannot fail on
// well-formed input) and then converts it, mapping any mismatch to `None`.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text(Value::deserialize(deserializer)?))
}

fn lenient_text_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.into_iter().filter_map(text).collect()),
        single @ Value::String(_) => text(single).map(|s| vec![s]),
        _ => None,
    })
}

fn lenient_lab_values<'de, D>(deserializer: D) -> Result<Option<Vec<LabValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}

fn lenient_report_type<'de, D>(deserializer: D) -> Result<Option<ReportType>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text(Value::deserialize(deserializer)?).and_then(|s| ReportType::from_label(&s)))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<LabFlag>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text(Value::deserialize(deserializer)?).and_then(|s| LabFlag::from_label(&s)))
}

/// Scalar JSON → non-blank string. Numbers keep their JSON rendering.
fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
