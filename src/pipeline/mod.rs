//! Pipeline stages for report extraction.
//!
//! Each submodule implements exactly one transformation step and depends
//! only on the previous step's output, so each is testable on its own with
//! fake collaborators.
//!
//! ## Data Flow
//!
//! ```text
//! access ──▶ mime ──▶ llm ──▶ parse ──▶ normalize
//! (URL→bytes) (type)  (model)  (JSON)    (defaults)
//! ```
//!
//! 1. [`access`]: read the URL; on a rejected read, sign once and retry once
//! 2. [`mime`]: pick the mime type from the response header or the caller hint
//! 3. [`llm`]: send prompt + bytes to the extraction model; the only
//!    stage besides `access` with network I/O
//! 4. [`parse`]: pull the JSON object out of the model's free text
//! 5. [`normalize`]: total, default-filling mapping to the form record

pub mod access;
pub mod llm;
pub mod mime;
pub mod normalize;
pub mod parse;

use std::fmt;

/// A pipeline stage, as reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Retrieve,
    Invoke,
    Parse,
    Normalize,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Retrieve => "retrieve",
            Stage::Invoke => "invoke",
            Stage::Parse => "parse",
            Stage::Normalize => "normalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
