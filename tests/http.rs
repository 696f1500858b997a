//! HTTP-level tests for the reqwest transport and the storage signer,
//! run against a local mock server.

use async_trait::async_trait;
use edgequake_report_extract::{
    ByteTransport, DocumentKind, DocumentReference, ExtractError, ExtractionModel, Extractor,
    HttpTransport, ModelError, RetrievedDocument, SignError, SigningConfig, SigningService,
    StorageSigner,
};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OBJECT_PATH: &str = "/storage/v1/object/public/reports/u1/scan.pdf";
const SIGN_PATH: &str = "/storage/v1/object/sign/reports/u1/scan.pdf";

fn signer_for(server: &MockServer) -> StorageSigner {
    StorageSigner::new(SigningConfig::new(server.uri(), "service-key", "reports").expires_in_secs(600))
        .expect("Failed to create signer")
}

// ── HttpTransport ────────────────────────────────────────────────────────────

#[tokio::test]
async fn transport_returns_status_header_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.7".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(10).unwrap();
    let response = transport
        .get(&format!("{}{}", server.uri(), OBJECT_PATH))
        .await
        .expect("read should reach the server");

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(response.body, b"%PDF-1.7");
}

#[tokio::test]
async fn transport_reports_rejections_as_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(10).unwrap();
    let response = transport
        .get(&format!("{}{}", server.uri(), OBJECT_PATH))
        .await
        .unwrap();

    assert_eq!(response.status, 403);
    assert!(!response.is_success());
}

#[tokio::test]
async fn transport_error_when_nothing_listens() {
    let transport = HttpTransport::new(5).unwrap();
    let err = transport
        .get("http://127.0.0.1:1/storage/v1/object/public/reports/a.pdf?token=secret")
        .await
        .unwrap_err();

    assert!(!err.timed_out);
    assert!(!err.reason.contains("token=secret"), "got: {}", err.reason);
}

// ── StorageSigner ────────────────────────────────────────────────────────────

#[tokio::test]
async fn signer_posts_credentials_and_absolutises_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIGN_PATH))
        .and(header("authorization", "Bearer service-key"))
        .and(header("apikey", "service-key"))
        .and(body_json(serde_json::json!({"expiresIn": 600})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signedURL": "/object/sign/reports/u1/scan.pdf?token=fresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let signer = signer_for(&server);
    let key = signer
        .extract_key(&format!("{}{}", server.uri(), OBJECT_PATH))
        .expect("key should be derived");
    assert_eq!(key, "u1/scan.pdf");

    let signed = signer.sign(&key).await.unwrap();
    assert_eq!(
        signed,
        format!("{}{}?token=fresh", server.uri(), SIGN_PATH)
    );
}

#[tokio::test]
async fn signer_surfaces_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIGN_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("Object not found"))
        .mount(&server)
        .await;

    let err = signer_for(&server).sign("u1/scan.pdf").await.unwrap_err();
    match err {
        SignError::Rejected { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Object not found");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn signer_rejects_response_without_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIGN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": null})))
        .mount(&server)
        .await;

    let err = signer_for(&server).sign("u1/scan.pdf").await.unwrap_err();
    assert!(matches!(err, SignError::MalformedResponse(_)));
}

// ── Full pipeline over HTTP ──────────────────────────────────────────────────

struct CannedModel;

#[async_trait]
impl ExtractionModel for CannedModel {
    async fn generate(&self, _prompt: &str, doc: &RetrievedDocument) -> Result<String, ModelError> {
        assert_eq!(doc.bytes, b"%PDF-1.7");
        Ok(r#"```json
{"reportType": "lab", "title": "Lipid Panel", "reportDate": "2024-11-05"}
```"#
            .to_string())
    }
}

fn extractor_for(server: &MockServer) -> Extractor {
    Extractor::new(
        Arc::new(HttpTransport::new(10).unwrap()),
        Arc::new(signer_for(server)),
        Arc::new(CannedModel),
    )
}

#[tokio::test]
async fn expired_public_url_recovers_through_signing_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "statusCode": "404", "error": "Bucket not found"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SIGN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signedURL": "/object/sign/reports/u1/scan.pdf?token=fresh"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SIGN_PATH))
        .and(query_param("token", "fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let doc = DocumentReference::new(format!("{}{}", server.uri(), OBJECT_PATH), DocumentKind::Pdf);
    let output = extractor_for(&server).extract(&doc).await.unwrap();

    assert!(output.stats.signed_retry);
    assert_eq!(output.stats.mime_type, "application/pdf");
    assert_eq!(output.form_data.title, "Lipid Panel");
    assert_eq!(output.form_data.report_date.to_string(), "2024-11-05");
}

#[tokio::test]
async fn second_rejection_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SIGN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signedURL": "/object/sign/reports/u1/scan.pdf?token=fresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}{}", server.uri(), OBJECT_PATH);
    let doc = DocumentReference::new(url.clone(), DocumentKind::Pdf);
    let err = extractor_for(&server).extract(&doc).await.unwrap_err();

    match err {
        ExtractError::Retrieval { url: reported, reason } => {
            assert_eq!(reported, url);
            assert!(!reason.contains("token=fresh"));
        }
        other => panic!("expected Retrieval, got {other:?}"),
    }
}
