//! Storage signing: turn a storage object key into a fresh, time-limited URL.
//!
//! Document URLs stored alongside reports are often signed URLs that have
//! since expired, or public URLs for a bucket that was later made private.
//! When a direct read is rejected, the access resolver asks a
//! [`SigningService`] to (a) recognise the object key inside the URL and
//! (b) mint a new authorised URL for it.
//!
//! [`StorageSigner`] speaks the object-storage REST dialect
//! (`/storage/v1/object/...`); [`NoSigning`] disables recovery entirely.

use crate::config::SigningConfig;
use crate::error::SignError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Signing collaborator. Must be safe to share across concurrent runs.
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Derive the storage key addressed by `url`, if it is one of ours.
    fn extract_key(&self, url: &str) -> Option<String>;

    /// Produce a freshly authorised URL for `key`.
    async fn sign(&self, key: &str) -> Result<String, SignError>;
}

/// Signing disabled: no key is ever derived, so no retry is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigning;

#[async_trait]
impl SigningService for NoSigning {
    fn extract_key(&self, _url: &str) -> Option<String> {
        None
    }

    async fn sign(&self, _key: &str) -> Result<String, SignError> {
        Err(SignError::NotConfigured)
    }
}

const ACCESS_SEGMENTS: [&str; 3] = ["public", "sign", "authenticated"];

// `/storage/v1/object/<bucket>/<key>` with an optional access segment.
static RE_OBJECT_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/storage/v1/object/(?:(public|sign|authenticated)/)?([^/]+)/(.+)$").unwrap()
});

/// Derive `(bucket, key)` from an object-storage URL. Query strings are ignored.
pub fn parse_object_url(url: &str) -> Option<(String, String)> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let caps = RE_OBJECT_PATH.captures(parsed.path())?;
    let bucket = &caps[2];
    // Without a captured access segment the regex may have matched the
    // access word itself as the bucket (`/object/public/reports/`).
    if caps.get(1).is_none() && ACCESS_SEGMENTS.contains(&bucket) {
        return None;
    }
    let key = caps[3].trim_end_matches('/');
    if key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: Option<String>,
}

/// [`SigningService`] for an object-storage REST endpoint.
#[derive(Debug, Clone)]
pub struct StorageSigner {
    config: SigningConfig,
    client: reqwest::Client,
}

impl StorageSigner {
    pub fn new(config: SigningConfig) -> Result<Self, SignError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SignError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Make a signed path returned by the endpoint absolute.
    fn absolutise(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!("{}/storage/v1/{}", self.base(), signed.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl SigningService for StorageSigner {
    fn extract_key(&self, url: &str) -> Option<String> {
        let (bucket, key) = parse_object_url(url)?;
        (bucket == self.config.bucket).then_some(key)
    }

    async fn sign(&self, key: &str) -> Result<String, SignError> {
        let endpoint = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base(),
            self.config.bucket,
            key
        );
        debug!("Requesting signed URL for key '{}'", key);

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .json(&SignRequest {
                expires_in: self.config.expires_in_secs,
            })
            .send()
            .await
            .map_err(|e| SignError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SignResponse = response
            .json()
            .await
            .map_err(|e| SignError::MalformedResponse(e.to_string()))?;

        parsed
            .signed_url
            .filter(|u| !u.is_empty())
            .map(|u| self.absolutise(&u))
            .ok_or_else(|| SignError::MalformedResponse("missing signedURL".into()))
    }
}
