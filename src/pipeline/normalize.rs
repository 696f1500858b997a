//! Normalisation: fill every default so the output record is total.
//!
//! This stage cannot fail. Whatever the parser produced, including an empty
//! object, maps to a [`NormalizedFormRecord`] with a concrete report type,
//! title and calendar date, and explicit `None` for everything else.
//! Normalising an already-normalised report returns it unchanged.

use crate::output::NormalizedFormRecord;
use crate::report::ExtractedReport;
use chrono::{DateTime, Local, NaiveDate};

/// Title used when the model supplies none.
pub const DEFAULT_TITLE: &str = "Uploaded Report";

/// Normalise using today's local date as the fallback report date.
pub fn normalize(report: &ExtractedReport) -> NormalizedFormRecord {
    normalize_on(report, Local::now().date_naive())
}

/// Normalise with an explicit fallback date.
pub fn normalize_on(report: &ExtractedReport, today: NaiveDate) -> NormalizedFormRecord {
    let report_type = report.report_type.unwrap_or_default();
    let title = report
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    let report_date = report
        .report_date
        .as_deref()
        .and_then(parse_report_date)
        .unwrap_or(today);
    let provider = report.provider.clone().unwrap_or_default();

    let extracted_data = ExtractedReport {
        report_type: Some(report_type),
        title: Some(title.clone()),
        report_date: Some(report_date.format("%Y-%m-%d").to_string()),
        provider: Some(provider.clone()),
        patient_hint: Some(report.patient_hint.clone().unwrap_or_default()),
        ..report.clone()
    };

    NormalizedFormRecord {
        report_type,
        title,
        report_date,
        provider_name: provider.name,
        provider_address: provider.address,
        provider_phone: provider.phone,
        findings: report.findings.clone(),
        conclusion: report.conclusion.clone(),
        extracted_data,
    }
}

/// Parse the date formats models actually emit.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps (date part kept), `YYYY/MM/DD`
/// and US-style `MM/DD/YYYY`. Anything else is rejected.
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDate::parse_from_str(s, "%Y/%m/%d").ok())
        .or_else(|| NaiveDate::parse_from_str(s, "%m/%d/%Y").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{LabFlag, LabValue, PatientHint, ProviderInfo, ReportType};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn full_report() -> ExtractedReport {
        ExtractedReport {
            report_type: Some(ReportType::Lab),
            title: Some("Complete Blood Count".into()),
            report_date: Some("2024-03-15".into()),
            provider: Some(ProviderInfo {
                name: Some("Quest Diagnostics".into()),
                address: Some("1 Lab Way".into()),
                phone: Some("555-0100".into()),
            }),
            patient_hint: Some(PatientHint {
                name: Some("Jane Doe".into()),
                dob: Some("1980-01-02".into()),
                mrn: Some("MRN-7".into()),
            }),
            findings: Some("Mild anemia".into()),
            conclusion: Some("Follow up".into()),
            lab_values: Some(vec![LabValue {
                test_name: Some("Hemoglobin".into()),
                value: Some("11.2".into()),
                unit: Some("g/dL".into()),
                reference_range: Some("12-16".into()),
                flag: Some(LabFlag::L),
            }]),
            diagnoses: Some(vec!["Anemia".into()]),
            recommendations: Some(vec!["Iron studies".into()]),
            medications: Some(vec![]),
            loinc_code: Some("58410-2".into()),
        }
    }

    #[test]
    fn empty_report_gets_defaults() {
        let r = normalize_on(&ExtractedReport::default(), today());
        assert_eq!(r.report_type, ReportType::Other);
        assert_eq!(r.title, DEFAULT_TITLE);
        assert_eq!(r.report_date, today());
        assert_eq!(r.provider_name, None);
        assert_eq!(r.provider_address, None);
        assert_eq!(r.provider_phone, None);
        assert_eq!(r.findings, None);
        assert_eq!(r.conclusion, None);
        assert_eq!(r.extracted_data.lab_values, None);
        assert_eq!(r.extracted_data.report_date.as_deref(), Some("2025-06-01"));
        assert_eq!(r.extracted_data.provider, Some(ProviderInfo::default()));
    }

    #[test]
    fn full_report_is_unchanged() {
        let input = full_report();
        let r = normalize_on(&input, today());
        assert_eq!(r.extracted_data, input);
        assert_eq!(r.report_type, ReportType::Lab);
        assert_eq!(r.title, "Complete Blood Count");
        assert_eq!(r.report_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(r.provider_name.as_deref(), Some("Quest Diagnostics"));
        assert_eq!(r.provider_phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn normalisation_is_idempotent() {
        let once = normalize_on(&ExtractedReport::default(), today());
        let twice = normalize_on(&once.extracted_data, today());
        assert_eq!(once, twice);

        let later = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let again = normalize_on(&once.extracted_data, later);
        assert_eq!(again.report_date, today());
    }

    #[test]
    fn unparseable_date_falls_back_to_today() {
        let r = normalize_on(
            &ExtractedReport {
                report_date: Some("sometime in March".into()),
                ..Default::default()
            },
            today(),
        );
        assert_eq!(r.report_date, today());
    }

    #[test]
    fn blank_title_gets_default() {
        let r = normalize_on(
            &ExtractedReport {
                title: Some("  ".into()),
                ..Default::default()
            },
            today(),
        );
        assert_eq!(r.title, DEFAULT_TITLE);
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_report_date("2024-03-15"), Some(d));
        assert_eq!(parse_report_date(" 2024-03-15 "), Some(d));
        assert_eq!(parse_report_date("2024-03-15T10:30:00Z"), Some(d));
        assert_eq!(parse_report_date("2024/03/15"), Some(d));
        assert_eq!(parse_report_date("03/15/2024"), Some(d));
        assert_eq!(parse_report_date("2024-02-30"), None);
        assert_eq!(parse_report_date("15.03.2024"), None);
    }

    #[test]
    fn form_record_serialises_total_shape() {
        let r = normalize_on(&ExtractedReport::default(), today());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], "other");
        assert_eq!(v["title"], DEFAULT_TITLE);
        assert_eq!(v["reportDate"], "2025-06-01");
        for key in [
            "providerName",
            "providerAddress",
            "providerPhone",
            "findings",
            "conclusion",
        ] {
            assert!(v[key].is_null(), "{key} should be null");
            assert!(v.as_object().unwrap().contains_key(key), "{key} missing");
        }
        assert_eq!(v["extractedData"]["reportType"], "other");
    }
}
