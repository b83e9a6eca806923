//! # ocr-summarizer
//!
//! Extract the text of a scanned image or multi-page PDF with OCR, then ask
//! a completion model for a short summary of it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Rasterize  every PDF page via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Extract    greyscale + tesseract per page, trimmed text
//!  ├─ 3. Assemble   join pages with "\n" in page order → ocr_text_<run>.txt
//!  ├─ 4. Summarize  one completion request, no retry
//!  └─ 5. Persist    summary → openai_response_<run>.txt
//! ```
//!
//! Every failure aborts the run at the step where it happened and is
//! returned as a [`PipelineError`]; a page with no recognisable text is not
//! a failure and contributes an empty string.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_summarizer::{Credentials, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .tesseract_path("/usr/bin/tesseract")
//!         .build()?;
//!     let pipeline = Pipeline::new(config)?;
//!     let creds = Credentials::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!         std::env::var("OPENAI_ORGANIZATION")?,
//!     );
//!     let output = pipeline.run("report.pdf", &creds).await?;
//!     println!("{}", output.summary);
//!     eprintln!("{} pages, text saved to {}",
//!         output.stats.page_count,
//!         output.ocr_text_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-summarize` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr-summarizer = { version = "0.1", default-features = false }
//! ```
//!
//! ## External engines
//!
//! PDF rendering needs the pdfium shared library (set `PDFIUM_LIB_PATH` or
//! [`PipelineConfigBuilder::pdfium_library_dir`]). OCR runs the `tesseract`
//! executable. Both can be replaced by injecting a [`Rasterizer`] or
//! [`TextRecognizer`] implementation.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifacts;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preferences;
pub mod progress;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifacts::{ArtifactKind, ArtifactStore, RunId};
pub use config::{CompletionOptions, Credentials, PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, Stage};
pub use output::{RunOutput, RunStats};
pub use pipeline::assemble::ExtractionResult;
pub use pipeline::input::{resolve_document, DocumentKind, DocumentRef};
pub use pipeline::llm::{CompletionService, OpenAiCompletions};
pub use pipeline::ocr::{TesseractCli, TextRecognizer};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use preferences::Preferences;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{run_sync, Pipeline, RunHandle, RunState};
