//! Configuration types for an OCR + summarization run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The config is handed to the orchestrator at
//! construction and never mutated afterwards, so the OCR executable path and
//! the completion parameters are fixed for the lifetime of a run.
//!
//! Credentials are deliberately *not* part of the config: they are supplied
//! per run (see [`Credentials`]) so a front end can change them between runs
//! without rebuilding the pipeline.

use crate::error::PipelineError;
use crate::pipeline::llm::CompletionService;
use crate::pipeline::ocr::TextRecognizer;
use crate::pipeline::render::Rasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the per-user folder that holds artifacts and preferences.
pub const APP_FOLDER: &str = "openai_ocr";

/// Default completion endpoint base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OCR + summarization pipeline.
///
/// # Example
/// ```rust
/// use ocr_summarizer::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .tesseract_path("/usr/local/bin/tesseract")
///     .max_output_tokens(300)
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Path (or bare name, resolved through `PATH`) of the tesseract executable.
    /// Default: `tesseract`.
    pub tesseract_path: PathBuf,

    /// Tesseract language code passed as `-l`. Default: `eng`.
    pub ocr_language: String,

    /// Number of pages OCR'd at once. Default: 1 (strictly sequential).
    ///
    /// Values above 1 run pages concurrently; results are always joined in
    /// page order regardless of completion order.
    pub ocr_concurrency: usize,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Directory containing the pdfium shared library. If None, uses
    /// `PDFIUM_LIB_PATH` or the system library search path.
    pub pdfium_library_dir: Option<PathBuf>,

    /// Parameters forwarded verbatim to the completion endpoint.
    pub completion: CompletionOptions,

    /// Custom prompt template containing `{text}`. If None, uses the built-in one.
    pub prompt_template: Option<String>,

    /// Completion API base URL. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Timeout for a single completion request, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Directory receiving `ocr_text_<run>.txt` and `openai_response_<run>.txt`.
    /// Default: `<Documents>/openai_ocr`.
    pub output_dir: PathBuf,

    /// Pre-constructed rasterizer. Takes precedence over the pdfium default.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract_path`.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    /// Pre-constructed completion service. Takes precedence over `base_url`.
    pub completion_service: Option<Arc<dyn CompletionService>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            ocr_language: "eng".to_string(),
            ocr_concurrency: 1,
            max_rendered_pixels: 2000,
            pdfium_library_dir: None,
            completion: CompletionOptions::default(),
            prompt_template: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_timeout_secs: 60,
            output_dir: default_app_dir(),
            rasterizer: None,
            recognizer: None,
            completion_service: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("tesseract_path", &self.tesseract_path)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_library_dir", &self.pdfium_library_dir)
            .field("completion", &self.completion)
            .field("base_url", &self.base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn TextRecognizer>"))
            .field(
                "completion_service",
                &self.completion_service.as_ref().map(|_| "<dyn CompletionService>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// The per-user application folder: `<Documents>/openai_ocr`, falling back to
/// the home directory and finally the temp directory.
pub fn default_app_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_FOLDER)
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, i32::MAX as u32);
        self
    }

    pub fn pdfium_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_dir = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.completion.model = model.into();
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.completion.max_output_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.completion.temperature = t;
        self
    }

    pub fn presence_penalty(mut self, p: f32) -> Self {
        self.config.completion.presence_penalty = p;
        self
    }

    pub fn frequency_penalty(mut self, p: f32) -> Self {
        self.config.completion.frequency_penalty = p;
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.completion.top_p = p;
        self
    }

    pub fn completion(mut self, options: CompletionOptions) -> Self {
        self.config.completion = options;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn completion_service(mut self, service: Arc<dyn CompletionService>) -> Self {
        self.config.completion_service = Some(service);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Completion parameters are not range-checked; the endpoint is the
    /// authority on what it accepts.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.tesseract_path.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "tesseract path must not be empty".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.completion.model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("model must not be empty".into()));
        }
        if let Some(ref template) = c.prompt_template {
            if !template.contains("{text}") {
                return Err(PipelineError::InvalidConfig(
                    "prompt template must contain a {text} placeholder".into(),
                ));
            }
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(PipelineError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        Ok(self.config)
    }
}

// ── Completion parameters ────────────────────────────────────────────────

/// Sampling parameters sent with the summary request.
///
/// Defaults reproduce the settings the tool has always used: a short
/// (200-token) answer, moderate temperature, and a presence penalty that
/// discourages the model from repeating the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Model identifier. Default: `gpt-3.5-turbo-instruct`.
    pub model: String,
    /// Maximum tokens in the summary. Default: 200.
    pub max_output_tokens: u32,
    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,
    /// Presence penalty. Default: 1.0.
    pub presence_penalty: f32,
    /// Frequency penalty. Default: 0.0.
    pub frequency_penalty: f32,
    /// Nucleus sampling mass. Default: 1.0.
    pub top_p: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".to_string(),
            max_output_tokens: 200,
            temperature: 0.7,
            presence_penalty: 1.0,
            frequency_penalty: 0.0,
            top_p: 1.0,
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// API key and organization id for the completion endpoint.
///
/// `Debug` never prints the key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub organization_id: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization_id: organization_id.into(),
        }
    }

    /// Reject empty (or whitespace-only) fields, key first.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.api_key.trim().is_empty() {
            return Err(PipelineError::MissingCredential { field: "api_key" });
        }
        if self.organization_id.trim().is_empty() {
            return Err(PipelineError::MissingCredential {
                field: "organization_id",
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("api_key", &key)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}
