//! Pipeline stages for OCR + summarization.
//!
//! Each submodule implements exactly one transformation step, behind a trait
//! where the step talks to an external engine, so the orchestrator in
//! [`crate::run`] can be driven by fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode+ocr ──▶ assemble ──▶ llm
//! (path)    (pdfium)   (tesseract)    (join)       (completion)
//! ```
//!
//! 1. [`input`]: classify the path as a single image or a PDF
//! 2. [`render`]: rasterise every PDF page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: greyscale + PNG into a scoped temp file for the OCR engine
//! 4. [`ocr`]: recognise one page image
//! 5. [`assemble`]: OCR every page and join the texts in page order
//! 6. [`llm`]: the summary request; the only stage with network I/O

pub mod assemble;
pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod render;
