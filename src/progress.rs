//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as a run moves through its stages and OCRs each page. A GUI can
//! forward them to its event loop; the CLI drives a terminal spinner.
//!
//! # Example
//!
//! ```rust
//! use ocr_summarizer::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for PageCounter {
//!     fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {}/{}: {} chars", page + 1, total_pages, text_len);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(PageCounter { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::artifacts::RunId;
use crate::error::Stage;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// Implementations must be `Send + Sync`: events are emitted from the
/// background task, and with `ocr_concurrency > 1` page events may arrive
/// from several tasks at once. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when a run has been accepted and assigned its id.
    fn on_run_start(&self, run: RunId) {
        let _ = run;
    }

    /// Called when the run enters a new stage.
    fn on_stage(&self, run: RunId, stage: Stage) {
        let _ = (run, stage);
    }

    /// Called before a page is handed to the OCR engine.
    ///
    /// `page` is 0-based.
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page has been recognised.
    ///
    /// `text_len` is the byte length of the trimmed text (0 for a blank page).
    fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
        let _ = (page, total_pages, text_len);
    }

    /// Called once when the run ends, successfully or not.
    fn on_run_complete(&self, run: RunId, success: bool) {
        let _ = (run, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
