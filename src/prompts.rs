//! Prompt template for the summary request.
//!
//! Callers can override the default via
//! [`crate::config::PipelineConfig::prompt_template`]; the template must
//! contain a `{text}` placeholder, which receives the assembled OCR text.

/// Default summary prompt. The trailing `Tl;dr:` cues a completion model to
/// answer with a short summary rather than continuing the document.
pub const DEFAULT_SUMMARY_PROMPT: &str = "Please provide main information of:\n\n{text}\n\nTl;dr:";

/// Placeholder replaced by the assembled text.
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Fill `template` (or the default) with the assembled text.
///
/// Only the first placeholder is substituted, so OCR text that itself
/// contains `{text}` is left alone.
pub fn build_summary_prompt(template: Option<&str>, text: &str) -> String {
    template
        .unwrap_or(DEFAULT_SUMMARY_PROMPT)
        .replacen(TEXT_PLACEHOLDER, text, 1)
}
