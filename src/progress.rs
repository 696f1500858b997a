//! Progress-callback trait for per-stage extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as a run moves through retrieval, the model call, and parsing.
//!
//! # Example
//!
//! ```rust
//! use edgequake_report_extract::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl ExtractionProgressCallback for PrintStages {
//!     fn on_stage_start(&self, url: &str, stage: Stage) {
//!         eprintln!("{url}: {}", stage.label());
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::Stage;
use std::sync::Arc;

/// Called by the pipeline as each run progresses.
///
/// Implementations must be `Send + Sync`: batch runs execute concurrently and
/// may call the same callback from several tasks at once. All methods have
/// no-op defaults so callers only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once when a run starts, before the first read.
    fn on_extraction_start(&self, url: &str) {
        let _ = url;
    }

    /// Called when a run enters `stage`.
    fn on_stage_start(&self, url: &str, stage: Stage) {
        let _ = (url, stage);
    }

    /// Called when a run fails; `stage` is the stage that failed.
    fn on_extraction_error(&self, url: &str, stage: &str, error: &str) {
        let _ = (url, stage, error);
    }

    /// Called once when a run finishes, successfully or not.
    fn on_extraction_complete(&self, url: &str, success: bool) {
        let _ = (url, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start("https://store/doc1");
        cb.on_stage_start("https://store/doc1", Stage::Retrieve);
        cb.on_extraction_error("https://store/doc1", "retrieve", "HTTP 404");
        cb.on_extraction_complete("https://store/doc1", false);
    }
}
