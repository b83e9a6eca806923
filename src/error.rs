//! Error types for the ocr-summarizer library.
//!
//! Every failure aborts the run at the step where it occurred; there is no
//! page-level partial success. [`PipelineError::stage`] tells the caller which
//! step of the pipeline was executing, so a front end can report "OCR failed"
//! differently from "the summary request was rejected".
//!
//! The one deliberate non-error is a page with no recognisable glyphs: the
//! text extractor returns an empty string and the run carries on.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline step an error (or a state transition) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    /// Resolving the input and converting PDF pages to images.
    Rasterizing,
    /// Running OCR over every page.
    Extracting,
    /// Joining page texts and persisting the OCR artifact.
    Assembling,
    /// Calling the completion endpoint and persisting the summary artifact.
    Summarizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Rasterizing => "rasterizing",
            Stage::Extracting => "extracting",
            Stage::Assembling => "assembling",
            Stage::Summarizing => "summarizing",
        };
        f.write_str(name)
    }
}

/// All errors returned by the ocr-summarizer library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file is missing, unreadable, corrupt, or not a valid PDF.
    #[error("Cannot read document '{path}': {detail}")]
    DocumentRead { path: PathBuf, detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine could not run, or a page could not be decoded.
    ///
    /// `page` is 0-based; a single-image document is page 0.
    #[error("Text extraction failed on page {page}: {detail}")]
    Extraction { page: usize, detail: String },

    // ── Summarization errors ──────────────────────────────────────────────
    /// API key or organization id was empty. No request was sent.
    #[error("Missing credential: {field} must not be empty")]
    MissingCredential { field: &'static str },

    /// The completion endpoint rejected the request or could not be reached.
    ///
    /// `status` is the upstream HTTP status when one was received; `None` for
    /// connection failures and timeouts.
    #[error("Summarization failed{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Summarization { status: Option<u16>, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a run artifact or the preferences file.
    #[error("Failed to write '{path}': {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `preferences.json` exists but cannot be decoded.
    #[error("Invalid preferences file '{path}': {detail}")]
    InvalidPreferences { path: PathBuf, detail: String },

    // ── Orchestration errors ──────────────────────────────────────────────
    /// A run is already in flight on this pipeline instance.
    #[error("A pipeline run is already in progress")]
    Busy,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (background task panicked, runtime failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The pipeline step this error aborts, or `None` for errors raised
    /// outside a run (busy rejection, configuration, preferences).
    ///
    /// Write failures happen in two steps (OCR text and summary), so
    /// `Persistence` has no fixed stage; the orchestrator records the exact
    /// step in [`crate::run::RunState::Failed`].
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::DocumentRead { .. } => Some(Stage::Rasterizing),
            PipelineError::Extraction { .. } => Some(Stage::Extracting),
            PipelineError::MissingCredential { .. } | PipelineError::Summarization { .. } => {
                Some(Stage::Summarizing)
            }
            PipelineError::Persistence { .. }
            | PipelineError::InvalidPreferences { .. }
            | PipelineError::Busy
            | PipelineError::InvalidConfig(_)
            | PipelineError::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarization_display_with_status() {
        let e = PipelineError::Summarization {
            status: Some(429),
            detail: "rate limited".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 429"), "got: {msg}");
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn summarization_display_without_status() {
        let e = PipelineError::Summarization {
            status: None,
            detail: "connection refused".into(),
        };
        assert!(!e.to_string().contains("HTTP"));
    }

    #[test]
    fn missing_credential_display() {
        let e = PipelineError::MissingCredential { field: "api_key" };
        assert!(e.to_string().contains("api_key"));
    }

    #[test]
    fn stages_map_to_taxonomy() {
        let read = PipelineError::DocumentRead {
            path: "x.pdf".into(),
            detail: "missing".into(),
        };
        assert_eq!(read.stage(), Some(Stage::Rasterizing));
        let ocr = PipelineError::Extraction {
            page: 2,
            detail: "bad".into(),
        };
        assert_eq!(ocr.stage(), Some(Stage::Extracting));
        assert_eq!(
            PipelineError::MissingCredential { field: "organization_id" }.stage(),
            Some(Stage::Summarizing)
        );
        assert_eq!(PipelineError::Busy.stage(), None);
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Extracting.to_string(), "extracting");
    }
}
