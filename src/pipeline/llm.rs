//! Summarizer client: send the assembled text to a completion endpoint.
//!
//! The request is a single text-completion call. The prompt wraps the OCR
//! text in the summary template from [`crate::prompts`], and every sampling
//! parameter in [`CompletionOptions`] is forwarded unchanged; the endpoint
//! is the authority on valid ranges.
//!
//! ## Failure Policy
//!
//! There is exactly one attempt per run. Empty credentials are rejected
//! before any network traffic, and any non-success status, transport error
//! or timeout surfaces as [`PipelineError::Summarization`]. Callers that
//! want a retry start a new run.

use crate::config::{CompletionOptions, Credentials, PipelineConfig};
use crate::error::PipelineError;
use crate::prompts::build_summary_prompt;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A text-completion backend.
///
/// The default implementation is [`OpenAiCompletions`]; tests and embedders
/// can inject their own through
/// [`crate::config::PipelineConfigBuilder::completion_service`].
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete `prompt` and return the first choice's text.
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        credentials: &Credentials,
    ) -> Result<String, PipelineError>;

    /// Model identifiers visible to `credentials`.
    async fn list_models(&self, credentials: &Credentials) -> Result<Vec<String>, PipelineError>;
}

/// OpenAI-compatible `/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiCompletions {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiCompletions {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.api_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(
        &self,
        req: reqwest::RequestBuilder,
        credentials: &Credentials,
    ) -> reqwest::RequestBuilder {
        req.bearer_auth(credentials.api_key.trim())
            .header("OpenAI-Organization", credentials.organization_id.trim())
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl CompletionService for OpenAiCompletions {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        credentials: &Credentials,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/completions", self.base_url);
        let body = build_request_body(prompt, options);

        let response = self
            .authorized(self.client.post(&url), credentials)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            PipelineError::Summarization {
                status: None,
                detail: format!("malformed completion response: {e}"),
            }
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Summarization {
                status: None,
                detail: "completion response contained no choices".into(),
            })?;
        Ok(choice.text.trim().to_string())
    }

    async fn list_models(&self, credentials: &Credentials) -> Result<Vec<String>, PipelineError> {
        credentials.validate()?;
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url), credentials)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let list: ModelList = response.json().await.map_err(|e| PipelineError::Summarization {
            status: None,
            detail: format!("malformed model list: {e}"),
        })?;

        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }
}

/// JSON body of a completion request.
pub fn build_request_body(prompt: &str, options: &CompletionOptions) -> Value {
    json!({
        "model": options.model,
        "prompt": prompt,
        "max_tokens": options.max_output_tokens,
        "n": 1,
        "temperature": options.temperature,
        "top_p": options.top_p,
        "presence_penalty": options.presence_penalty,
        "frequency_penalty": options.frequency_penalty,
    })
}

fn transport_error(e: reqwest::Error) -> PipelineError {
    let detail = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        format!("endpoint unreachable: {e}")
    };
    PipelineError::Summarization {
        status: None,
        detail,
    }
}

/// Pass a 2xx response through; turn anything else into an error carrying
/// the upstream status and, when present, its `error.message`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Summarization {
        status: Some(status.as_u16()),
        detail: upstream_message(&body).unwrap_or_else(|| status.to_string()),
    })
}

fn upstream_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Summarize `text` with one completion call.
///
/// Credentials are checked first; when either field is empty the service is
/// never invoked. Empty `text` is still sent.
pub async fn summarize(
    service: &Arc<dyn CompletionService>,
    text: &str,
    credentials: &Credentials,
    config: &PipelineConfig,
) -> Result<String, PipelineError> {
    credentials.validate()?;

    let prompt = build_summary_prompt(config.prompt_template.as_deref(), text);
    let start = Instant::now();
    info!(
        "Requesting summary from {} ({} chars of text)",
        config.completion.model,
        text.len()
    );

    match service.complete(&prompt, &config.completion, credentials).await {
        Ok(summary) => {
            debug!(
                "Summary received: {} chars in {:?}",
                summary.len(),
                start.elapsed()
            );
            Ok(summary)
        }
        Err(e) => {
            warn!("Summary request failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        prompts: Mutex<Vec<String>>,
        fail_with: Option<u16>,
    }

    #[async_trait]
    impl CompletionService for RecordingService {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
            _credentials: &Credentials,
        ) -> Result<String, PipelineError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.fail_with {
                Some(status) => Err(PipelineError::Summarization {
                    status: Some(status),
                    detail: "Incorrect API key provided".into(),
                }),
                None => Ok("A short summary.".into()),
            }
        }

        async fn list_models(&self, _credentials: &Credentials) -> Result<Vec<String>, PipelineError> {
            Ok(vec!["gpt-3.5-turbo-instruct".into()])
        }
    }

    fn creds() -> Credentials {
        Credentials::new("sk-test", "org-test")
    }

    #[test]
    fn request_body_forwards_every_option() {
        let options = CompletionOptions {
            model: "my-model".into(),
            max_output_tokens: 42,
            temperature: 1.5,
            presence_penalty: -0.5,
            frequency_penalty: 0.25,
            top_p: 0.5,
        };
        let body = build_request_body("hello", &options);
        assert_eq!(body["model"], "my-model");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["max_tokens"], 42);
        assert_eq!(body["n"], 1);
        assert_eq!(body["temperature"], 1.5);
        assert_eq!(body["presence_penalty"], -0.5);
        assert_eq!(body["frequency_penalty"], 0.25);
        assert_eq!(body["top_p"], 0.5);
    }

    #[test]
    fn upstream_message_is_extracted() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        assert_eq!(
            upstream_message(body).as_deref(),
            Some("You exceeded your current quota")
        );
        assert_eq!(upstream_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client =
            OpenAiCompletions::new("http://localhost:8080/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn prompt_wraps_text() {
        let fake = Arc::new(RecordingService::default());
        let service: Arc<dyn CompletionService> = fake.clone();
        let summary = summarize(&service, "Page One", &creds(), &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(summary, "A short summary.");
        let prompts = fake.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Page One"));
        assert!(prompts[0].ends_with("Tl;dr:"));
    }

    #[tokio::test]
    async fn empty_credentials_never_reach_the_service() {
        let fake = Arc::new(RecordingService::default());
        let service: Arc<dyn CompletionService> = fake.clone();
        let err = summarize(
            &service,
            "text",
            &Credentials::new("", "org-test"),
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::MissingCredential { field: "api_key" }));
        assert!(fake.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let fake = Arc::new(RecordingService {
            fail_with: Some(401),
            ..Default::default()
        });
        let service: Arc<dyn CompletionService> = fake.clone();
        let err = summarize(&service, "text", &creds(), &PipelineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Summarization { status: Some(401), .. }));
        assert_eq!(fake.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_text_is_still_summarized() {
        let fake = Arc::new(RecordingService::default());
        let service: Arc<dyn CompletionService> = fake.clone();
        summarize(&service, "", &creds(), &PipelineConfig::default())
            .await
            .unwrap();
        assert_eq!(fake.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_has_no_status() {
        // Nothing listens on the discard port.
        let client = OpenAiCompletions::new("http://127.0.0.1:9/v1", Duration::from_secs(2)).unwrap();
        let err = client
            .complete("hi", &CompletionOptions::default(), &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Summarization { status: None, .. }));
    }
}
