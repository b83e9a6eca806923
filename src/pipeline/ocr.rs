//! Text extraction: one page image in, trimmed text out.
//!
//! The default engine is the `tesseract` command-line program, located through
//! the configured executable path. Each page is normalised to greyscale,
//! written to a scoped temp PNG, and recognised with
//! `tesseract <png> stdout -l <lang>`.
//!
//! A page without recognisable glyphs yields `""`. Every other failure
//! (executable missing, non-zero exit, undecodable output) is an
//! [`PipelineError::Extraction`] and aborts the run.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::encode;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Recognises the text on a single image.
///
/// Implementations are synchronous; the orchestrator runs them inside
/// `spawn_blocking`. `page` is the 0-based page index, used for error
/// reporting only.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, page: usize, image: &DynamicImage) -> Result<String, PipelineError>;
}

/// OCR through the tesseract command-line program.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
    language: String,
}

impl TesseractCli {
    pub fn new(executable: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.tesseract_path, &config.ocr_language)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run `tesseract --version`; `Ok` carries the first line of its output.
    pub fn version(&self) -> Result<String, PipelineError> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .output()
            .map_err(|e| self.launch_error(0, e))?;
        // Older builds print the banner on stderr.
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn launch_error(&self, page: usize, e: std::io::Error) -> PipelineError {
        PipelineError::Extraction {
            page,
            detail: format!(
                "could not run OCR engine '{}': {e}",
                self.executable.display()
            ),
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, page: usize, image: &DynamicImage) -> Result<String, PipelineError> {
        let png = encode::write_ocr_png(image).map_err(|e| PipelineError::Extraction {
            page,
            detail: format!("could not prepare page image: {e}"),
        })?;

        let output = Command::new(&self.executable)
            .arg(png.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| self.launch_error(page, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract failed on page {}: {}", page, stderr.trim());
            return Err(PipelineError::Extraction {
                page,
                detail: format!("OCR engine exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Page {}: recognised {} chars", page, text.len());
        Ok(text)
    }
}

/// Decode an image file for OCR. Failure is an extraction error on page 0,
/// since a single-image document has exactly one page.
pub fn load_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    image::open(path).map_err(|e| PipelineError::Extraction {
        page: 0,
        detail: format!("cannot decode image '{}': {e}", path.display()),
    })
}
