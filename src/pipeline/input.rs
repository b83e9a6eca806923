//! Input resolution: turn a user-supplied path into a [`DocumentRef`].
//!
//! The discriminator is the file extension (`.pdf`, case-insensitive, is a
//! multi-page PDF; anything else is treated as a single image). For PDFs we
//! also check the `%PDF` magic bytes here so a renamed text file fails with a
//! clear [`PipelineError::DocumentRead`] before pdfium is ever loaded.

use crate::error::PipelineError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What kind of document a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DocumentKind {
    /// One raster image (PNG, JPEG, BMP, TIFF, ...).
    SingleImage,
    /// A PDF whose pages are rasterised before OCR.
    MultiPagePdf,
}

/// A document path plus its kind. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    path: PathBuf,
    kind: DocumentKind,
}

impl DocumentRef {
    /// Build a reference without touching the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = kind_for(&path);
        Self { path, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == DocumentKind::MultiPagePdf
    }
}

fn kind_for(path: &Path) -> DocumentKind {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        DocumentKind::MultiPagePdf
    } else {
        DocumentKind::SingleImage
    }
}

/// Resolve a local path, validating existence, readability and, for PDFs,
/// the magic bytes.
pub fn resolve_document(path: impl AsRef<Path>) -> Result<DocumentRef, PipelineError> {
    let doc = DocumentRef::new(path.as_ref());
    let read_err = |detail: String| PipelineError::DocumentRead {
        path: doc.path.clone(),
        detail,
    };

    if !doc.path.is_file() {
        return Err(read_err("file not found".into()));
    }

    match std::fs::File::open(&doc.path) {
        Ok(mut f) => {
            if doc.is_pdf() {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                    return Err(read_err(format!(
                        "not a valid PDF (first bytes: {:?})",
                        magic
                    )));
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(read_err("permission denied".into()));
        }
        Err(e) => return Err(read_err(e.to_string())),
    }

    debug!("Resolved {:?} document: {}", doc.kind, doc.path.display());
    Ok(doc)
}
