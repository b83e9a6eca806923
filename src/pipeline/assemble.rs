//! Document assembly: OCR every page, then join the texts in page order.
//!
//! Every page of the sequence is recognised; none are skipped. With
//! `ocr_concurrency > 1` several pages are in flight at once, but
//! `buffered` yields results in submission order and [`ExtractionResult`]
//! is keyed by page index, so the assembled text is identical to a
//! sequential run.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::ocr::TextRecognizer;
use futures::stream::{self, StreamExt, TryStreamExt};
use image::DynamicImage;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Separator placed between consecutive page texts.
pub const PAGE_SEPARATOR: &str = "\n";

/// Recognised text per page, keyed by 0-based page index.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExtractionResult {
    pages: BTreeMap<usize, String>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: usize, text: String) {
        self.pages.insert(page, text);
    }

    pub fn get(&self, page: usize) -> Option<&str> {
        self.pages.get(&page).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page texts in ascending page order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.pages.iter().map(|(i, t)| (*i, t.as_str()))
    }

    /// Join all page texts in ascending page order with [`PAGE_SEPARATOR`].
    ///
    /// A single page is returned as-is, without any separator.
    pub fn assemble(&self) -> String {
        self.pages
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }
}

impl FromIterator<(usize, String)> for ExtractionResult {
    fn from_iter<I: IntoIterator<Item = (usize, String)>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().collect(),
        }
    }
}

/// OCR every page of `pages`, stopping at the first failure.
///
/// Texts are trimmed whatever the recognizer returns.
pub async fn extract_pages(
    recognizer: &Arc<dyn TextRecognizer>,
    pages: Vec<DynamicImage>,
    config: &PipelineConfig,
) -> Result<ExtractionResult, PipelineError> {
    let total_pages = pages.len();
    let progress = config.progress_callback.clone();

    let texts: Vec<(usize, String)> = stream::iter(pages.into_iter().enumerate().map(
        |(idx, image)| {
            let recognizer = Arc::clone(recognizer);
            let progress = progress.clone();
            async move {
                if let Some(ref cb) = progress {
                    cb.on_page_start(idx, total_pages);
                }
                let text = tokio::task::spawn_blocking(move || recognizer.recognize(idx, &image))
                    .await
                    .map_err(|e| PipelineError::Internal(format!("OCR task panicked: {}", e)))??;
                let text = text.trim().to_string();
                if let Some(ref cb) = progress {
                    cb.on_page_complete(idx, total_pages, text.len());
                }
                Ok::<_, PipelineError>((idx, text))
            }
        },
    ))
    .buffered(config.ocr_concurrency.max(1))
    .try_collect()
    .await?;

    debug!("Extracted text from {} pages", texts.len());
    Ok(texts.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Recognises a page as "Page <width>", sleeping longer on earlier pages
    /// so concurrent runs complete out of order.
    struct WidthOcr {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl WidthOcr {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    impl TextRecognizer for WidthOcr {
        fn recognize(&self, page: usize, image: &DynamicImage) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(page) {
                return Err(PipelineError::Extraction {
                    page,
                    detail: "engine crashed".into(),
                });
            }
            std::thread::sleep(Duration::from_millis(5 * (4 - page.min(4) as u64)));
            Ok(format!("  Page {}\n", image.width()))
        }
    }

    fn pages(n: u32) -> Vec<DynamicImage> {
        (1..=n).map(|w| DynamicImage::new_luma8(w, 1)).collect()
    }

    #[test]
    fn assemble_joins_in_page_order() {
        let result: ExtractionResult = vec![
            (2, "Page Three".to_string()),
            (0, "Page One".to_string()),
            (1, "Page Two".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(result.assemble(), "Page One\nPage Two\nPage Three");
    }

    #[test]
    fn single_page_has_no_separator() {
        let mut result = ExtractionResult::new();
        result.insert(0, "only page".into());
        assert_eq!(result.assemble(), "only page");
    }

    #[test]
    fn empty_pages_keep_their_slot() {
        let result: ExtractionResult =
            vec![(0, "a".to_string()), (1, String::new()), (2, "c".to_string())]
                .into_iter()
                .collect();
        assert_eq!(result.assemble(), "a\n\nc");
    }

    #[tokio::test]
    async fn every_page_is_extracted() {
        let ocr = Arc::new(WidthOcr::new());
        let recognizer: Arc<dyn TextRecognizer> = ocr.clone();
        let config = PipelineConfig::default();

        let result = extract_pages(&recognizer, pages(3), &config).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.get(2), Some("Page 3"));
    }

    #[tokio::test]
    async fn concurrent_extraction_keeps_page_order() {
        let recognizer: Arc<dyn TextRecognizer> = Arc::new(WidthOcr::new());
        let config = PipelineConfig::builder().ocr_concurrency(4).build().unwrap();

        let result = extract_pages(&recognizer, pages(4), &config).await.unwrap();
        let order: Vec<usize> = result.iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(result.assemble(), "Page 1\nPage 2\nPage 3\nPage 4");
    }

    #[tokio::test]
    async fn failure_propagates() {
        let ocr = WidthOcr {
            calls: AtomicUsize::new(0),
            fail_on: Some(1),
        };
        let recognizer: Arc<dyn TextRecognizer> = Arc::new(ocr);
        let err = extract_pages(&recognizer, pages(3), &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction { page: 1, .. }));
    }
}
