//! Byte transport: the network-read primitive used by the access resolver.
//!
//! The resolver only needs "GET this URL, give me status, content type and
//! body". Hiding reqwest behind [`ByteTransport`] lets tests script the exact
//! sequence of responses (403 → 200, 401 → 401, …) and count how many reads
//! the pipeline issued.

use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Outcome of a read that reached the server.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Raw `Content-Type` header value, if the server sent one.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("body", &format_args!("<{} bytes>", self.body.len()))
            .finish()
    }
}

/// `url` without its query string or fragment.
///
/// Storage links carry their credentials in the query, so this is the form
/// that goes into logs and error messages.
pub fn log_safe_url(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(end) => &url[..end],
        None => url,
    }
}

/// A network-read primitive. Must be safe to share across concurrent runs.
#[async_trait]
pub trait ByteTransport: Send + Sync {
    /// Read `url`. Returns `Err` only when no HTTP response was received.
    async fn get(&self, url: &str) -> Result<FetchResponse, TransportError>;
}

/// [`ByteTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose reads time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError {
                url: String::new(),
                reason: e.to_string(),
                timed_out: false,
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared connection pool, custom TLS, …).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse, TransportError> {
        // reqwest embeds the URL in its messages; signed URLs carry tokens.
        let to_err = |e: reqwest::Error| TransportError {
            url: log_safe_url(url).to_string(),
            timed_out: e.is_timeout(),
            reason: e.without_url().to_string(),
        };

        let response = self.client.get(url).send().await.map_err(to_err)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(to_err)?.to_vec();
        debug!("GET → HTTP {}, {} bytes, content-type {:?}", status, body.len(), content_type);

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}
