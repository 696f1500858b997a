//! Mime classification for retrieved documents.
//!
//! The `Content-Type` header wins over the caller's hint; the hint only
//! decides when the header is missing or names something we don't send
//! (`application/octet-stream` from a bucket without metadata is common).

use crate::output::DocumentKind;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// Pick the mime type sent to the model.
///
/// Header checks run in order `pdf`, `png`, `jpeg`/`jpg` (case-insensitive
/// substring); otherwise `hint` decides between PDF and JPEG.
pub fn classify(content_type: Option<&str>, hint: DocumentKind) -> &'static str {
    if let Some(ct) = content_type.map(str::to_ascii_lowercase) {
        if ct.contains("pdf") {
            return MIME_PDF;
        }
        if ct.contains("png") {
            return MIME_PNG;
        }
        if ct.contains("jpeg") || ct.contains("jpg") {
            return MIME_JPEG;
        }
    }
    match hint {
        DocumentKind::Pdf => MIME_PDF,
        DocumentKind::Image => MIME_JPEG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wins_over_hint() {
        assert_eq!(classify(Some("application/pdf"), DocumentKind::Image), MIME_PDF);
        assert_eq!(classify(Some("image/png"), DocumentKind::Pdf), MIME_PNG);
        assert_eq!(classify(Some("image/jpeg"), DocumentKind::Pdf), MIME_JPEG);
        assert_eq!(classify(Some("image/jpg"), DocumentKind::Pdf), MIME_JPEG);
    }

    #[test]
    fn header_match_is_case_insensitive_with_params() {
        assert_eq!(
            classify(Some("Application/PDF; charset=binary"), DocumentKind::Image),
            MIME_PDF
        );
    }

    #[test]
    fn hint_is_fallback() {
        assert_eq!(classify(None, DocumentKind::Pdf), MIME_PDF);
        assert_eq!(classify(None, DocumentKind::Image), MIME_JPEG);
        assert_eq!(
            classify(Some("application/octet-stream"), DocumentKind::Pdf),
            MIME_PDF
        );
        assert_eq!(classify(Some(""), DocumentKind::Image), MIME_JPEG);
    }

    #[test]
    fn unsupported_image_types_fall_back_to_hint() {
        assert_eq!(classify(Some("image/tiff"), DocumentKind::Image), MIME_JPEG);
    }
}
