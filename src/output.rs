//! Output types returned by a successful run.

use crate::artifacts::RunId;
use crate::pipeline::assemble::ExtractionResult;
use crate::pipeline::input::DocumentKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a completed run produced.
///
/// Only a fully successful run yields a `RunOutput`; on failure the caller
/// gets a [`crate::PipelineError`] and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: RunId,

    /// Input document path as given.
    pub document: PathBuf,

    pub kind: DocumentKind,

    /// Assembled text: page texts joined with `\n` in page order.
    pub full_text: String,

    /// Summary returned by the completion endpoint.
    pub summary: String,

    /// Per-page recognised text.
    pub pages: ExtractionResult,

    /// Where the assembled text was persisted (`ocr_text_<run>.txt`).
    pub ocr_text_path: PathBuf,

    /// Where the summary was persisted (`openai_response_<run>.txt`).
    pub summary_path: PathBuf,

    pub stats: RunStats,
}

/// Timing for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of pages OCR'd (1 for a single image).
    pub page_count: usize,
    /// Time spent rasterising (0 for a single image).
    pub render_duration_ms: u64,
    /// Time spent in OCR across all pages.
    pub ocr_duration_ms: u64,
    /// Time spent waiting for the summary.
    pub summary_duration_ms: u64,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
}
