//! Page rasterisation: render every page of a PDF to a `DynamicImage`.
//!
//! pdfium keeps thread-local state and blocks for the whole render, so the
//! [`Rasterizer`] trait is synchronous and the orchestrator calls it inside
//! `tokio::task::spawn_blocking`.
//!
//! The render size is capped by `max_rendered_pixels` on the longest edge
//! rather than by DPI, so a poster-sized page cannot exhaust memory.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Converts a PDF into its ordered page images.
pub trait Rasterizer: Send + Sync {
    /// Render all pages in document order; index = 0-based page number.
    ///
    /// A PDF with zero pages yields an empty vector. A missing, corrupt, or
    /// unparsable file is a [`PipelineError::DocumentRead`].
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, PipelineError>;
}

/// Default rasterizer backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pixels: u32,
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(max_pixels: u32, library_dir: Option<PathBuf>) -> Self {
        Self {
            max_pixels,
            library_dir,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_rendered_pixels, config.pdfium_library_dir.clone())
    }

    /// Longest rendered edge as pdfium takes it; saturates at `i32::MAX`.
    fn edge_px(&self) -> i32 {
        i32::try_from(self.max_pixels).unwrap_or(i32::MAX)
    }

    /// Bind pdfium: explicit directory, then `PDFIUM_LIB_PATH`, then the
    /// system library search path.
    fn bind(&self, pdf_path: &Path) -> Result<Pdfium, PipelineError> {
        let bind_err = |e: PdfiumError| PipelineError::DocumentRead {
            path: pdf_path.to_path_buf(),
            detail: format!("PDF engine unavailable: {e}"),
        };

        let bound = if let Some(ref dir) = self.library_dir {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        } else if let Ok(lib) = std::env::var("PDFIUM_LIB_PATH") {
            Pdfium::bind_to_library(lib)
        } else {
            Pdfium::bind_to_system_library()
        };
        let bindings = bound.map_err(bind_err)?;

        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, PipelineError> {
        let pdfium = self.bind(pdf_path)?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PipelineError::DocumentRead {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let edge = self.edge_px();
        let render_config = PdfRenderConfig::new()
            .set_target_width(edge)
            .set_maximum_height(edge);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PipelineError::DocumentRead {
                    path: pdf_path.to_path_buf(),
                    detail: format!("page {idx} could not be rendered: {:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

/// Rasterise off the async executor.
pub async fn rasterize_blocking(
    rasterizer: &std::sync::Arc<dyn Rasterizer>,
    pdf_path: &Path,
) -> Result<Vec<DynamicImage>, PipelineError> {
    let rasterizer = std::sync::Arc::clone(rasterizer);
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || rasterizer.rasterize(&path))
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
}
