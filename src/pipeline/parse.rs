//! Response parsing: pull the JSON object out of the model's free text.
//!
//! Even when told to "respond with the JSON object only", models wrap the
//! answer in prose or in ```` ```json ```` fences. The parser takes the span
//! from the first `{` to the last `}` and parses that. It does no schema
//! validation: unexpected keys are ignored and missing or mistyped fields
//! decode as `None` (see [`crate::report`]), leaving defaults to
//! [`crate::pipeline::normalize`].

use crate::error::ParseFailure;
use crate::output::RawModelAnswer;
use crate::report::ExtractedReport;
use serde_json::Value;
use tracing::{debug, warn};

/// Parse the model answer into an [`ExtractedReport`].
pub fn parse(answer: &RawModelAnswer) -> Result<ExtractedReport, ParseFailure> {
    let Some(json) = locate_json(answer.as_str()) else {
        warn!(stage = "parse", "No JSON object in {} char answer", answer.as_str().len());
        return Err(ParseFailure::NoJson);
    };

    // Decoding into a `Value` first keeps the last of any repeated keys.
    let value: Value = serde_json::from_str(json).map_err(malformed)?;
    let report = ExtractedReport::from_json(value).map_err(malformed)?;

    debug!("Parsed report: type={:?}, title={:?}", report.report_type, report.title);
    Ok(report)
}

fn malformed(e: serde_json::Error) -> ParseFailure {
    warn!(stage = "parse", "Malformed JSON in model answer: {}", e);
    ParseFailure::MalformedJson {
        detail: e.to_string(),
    }
}

/// The span from the first `{` to the last `}` (inclusive), if any.
pub fn locate_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportType;

    fn answer(s: &str) -> RawModelAnswer {
        RawModelAnswer(s.to_string())
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let r = parse(&answer(
            "Here is the result:\n{\"reportType\":\"lab\",\"title\":\"CBC\"}\nThanks",
        ))
        .unwrap();
        assert_eq!(r.report_type, Some(ReportType::Lab));
        assert_eq!(r.title.as_deref(), Some("CBC"));
        assert_eq!(
            r,
            crate::report::ExtractedReport {
                report_type: Some(ReportType::Lab),
                title: Some("CBC".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn extracts_json_inside_code_fence() {
        let r = parse(&answer(
            "```json\n{\"reportType\": \"radiology\", \"findings\": \"No acute process.\"}\n```",
        ))
        .unwrap();
        assert_eq!(r.report_type, Some(ReportType::Radiology));
        assert_eq!(r.findings.as_deref(), Some("No acute process."));
    }

    #[test]
    fn nested_objects_use_outermost_braces() {
        let r = parse(&answer(
            "{\"provider\": {\"name\": \"St. Mary Lab\"}, \"title\": \"Panel\"}",
        ))
        .unwrap();
        assert_eq!(r.provider.unwrap().name.as_deref(), Some("St. Mary Lab"));
    }

    #[test]
    fn no_braces_is_no_json() {
        assert_eq!(
            parse(&answer("I could not read this document.")),
            Err(ParseFailure::NoJson)
        );
        assert_eq!(parse(&answer("")), Err(ParseFailure::NoJson));
    }

    #[test]
    fn reversed_braces_is_no_json() {
        assert_eq!(parse(&answer("} nothing here {")), Err(ParseFailure::NoJson));
    }

    #[test]
    fn unbalanced_body_is_malformed() {
        let err = parse(&answer("{\"title\": \"CBC\", \"labValues\": [}")).unwrap_err();
        assert!(matches!(err, ParseFailure::MalformedJson { .. }));
    }

    #[test]
    fn two_objects_in_prose_are_malformed() {
        let err = parse(&answer("first {\"a\":1} then {\"b\":2}")).unwrap_err();
        assert!(matches!(err, ParseFailure::MalformedJson { .. }));
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let r = parse(&answer("{\"title\":\"X\",\"confidence\":0.9,\"notes\":[1,2]}")).unwrap();
        assert_eq!(r.title.as_deref(), Some("X"));
    }

    #[test]
    fn repeated_keys_keep_the_last_value() {
        let r = parse(&answer(
            r#"{"title":"CBC","reportType":"lab","title":"CBC Panel"}"#,
        ))
        .unwrap();
        assert_eq!(r.title.as_deref(), Some("CBC Panel"));
        assert_eq!(r.report_type, Some(ReportType::Lab));
    }

    #[test]
    fn patient_under_two_names_is_accepted() {
        let r = parse(&answer(
            r#"{"title":"CBC","patient":{"name":"A"},"patientInfo":{"name":"A"}}"#,
        ))
        .unwrap();
        assert_eq!(r.title.as_deref(), Some("CBC"));
        assert_eq!(r.patient_hint.unwrap().name.as_deref(), Some("A"));
    }

    #[test]
    fn locate_json_span() {
        assert_eq!(locate_json("a {x} b"), Some("{x}"));
        assert_eq!(locate_json("{"), None);
        assert_eq!(locate_json("}{"), None);
    }
}
