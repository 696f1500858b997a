//! Access resolution: turn a document URL into bytes.
//!
//! Stored document URLs go stale: signed links expire and buckets change
//! visibility. Resolution is a fixed two-step sequence, not a loop:
//!
//! ```text
//! direct read ──ok──────────────────────────────────▶ bytes
//!      │
//!   non-2xx ──▶ extract_key ──▶ sign ──▶ signed read ─ok─▶ bytes
//!                   │             │           │
//!                  none          err        non-2xx
//!                   └─────────────┴───────────┴──────▶ RetrievalError
//! ```
//!
//! At most two reads and one signing call happen per run. A read that gets
//! no HTTP response at all (DNS, TLS, timeout) fails immediately; recovery
//! is only for reads the storage server actively rejected.

use crate::error::ExtractError;
use crate::output::{DocumentReference, RetrievedDocument};
use crate::pipeline::mime;
use crate::signing::SigningService;
use crate::transport::{log_safe_url, ByteTransport, FetchResponse};
use tracing::{debug, info, warn};

/// A retrieved document and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub document: RetrievedDocument,
    /// `true` when the bytes came from the signed retry.
    pub signed_retry: bool,
}

/// Read `doc.url`, recovering once through `signer` if the read is rejected.
pub async fn resolve(
    doc: &DocumentReference,
    transport: &dyn ByteTransport,
    signer: &dyn SigningService,
) -> Result<Resolved, ExtractError> {
    let url = doc.url.as_str();
    info!("Fetching document: {}", log_safe_url(url));

    // ── Attempt ──────────────────────────────────────────────────────────
    let first = read(transport, url, url).await?;

    // ── Optional recover + final attempt ─────────────────────────────────
    let (response, signed_retry) = if first.is_success() {
        (first, false)
    } else {
        warn!(
            stage = "retrieve",
            status = first.status,
            "Direct read of {} rejected; trying a signed URL",
            log_safe_url(url)
        );
        match signed_url(url, signer).await {
            // The signed URL carries credentials: errors name `url`.
            Some(signed) => (read(transport, &signed, url).await?, true),
            None => (first, false),
        }
    };

    if !response.is_success() {
        let reason = if signed_retry {
            format!("HTTP {} after signed retry", response.status)
        } else {
            format!("HTTP {}", response.status)
        };
        return Err(ExtractError::Retrieval {
            url: log_safe_url(url).to_string(),
            reason,
        });
    }

    let mime_type = mime::classify(response.content_type.as_deref(), doc.kind);
    debug!(
        "Fetched {} bytes as {} (header {:?}, signed_retry={})",
        response.body.len(),
        mime_type,
        response.content_type,
        signed_retry
    );

    Ok(Resolved {
        document: RetrievedDocument {
            bytes: response.body,
            mime_type: mime_type.to_string(),
        },
        signed_retry,
    })
}

/// Ask the signing collaborator for a fresh URL. `None` means "no recovery".
async fn signed_url(url: &str, signer: &dyn SigningService) -> Option<String> {
    let Some(key) = signer.extract_key(url) else {
        debug!("No storage key derivable from {}; not retrying", log_safe_url(url));
        return None;
    };

    match signer.sign(&key).await {
        Ok(signed) => {
            debug!("Obtained signed URL for key '{}'", key);
            Some(signed)
        }
        Err(e) => {
            warn!(stage = "retrieve", "Signing key '{}' failed: {}", key, e);
            None
        }
    }
}

/// One network read. `reported` is the URL named in errors.
async fn read(
    transport: &dyn ByteTransport,
    target: &str,
    reported: &str,
) -> Result<FetchResponse, ExtractError> {
    transport
        .get(target)
        .await
        .map_err(|e| ExtractError::Retrieval {
            url: log_safe_url(reported).to_string(),
            reason: if e.timed_out {
                "request timed out".to_string()
            } else {
                e.reason
            },
        })
}
