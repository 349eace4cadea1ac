//! Abstractions over the external summarization model.
//!
//! The model is a black box mapping text to a shorter text within word bounds. Two HTTP
//! providers are supported: the Hugging Face inference API (the default, serving
//! `facebook/bart-large-cnn`) and a local Ollama runtime. Both issue requests directly with
//! `reqwest`.

use crate::config::{Config, SummarizationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_HUGGING_FACE_URL: &str = "https://api-inference.huggingface.co";

/// Errors surfaced while invoking the summarization model.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider was unreachable.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Word bounds requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBounds {
    /// Minimum summary length.
    pub min_words: usize,
    /// Maximum summary length.
    pub max_words: usize,
}

impl Default for SummaryBounds {
    fn default() -> Self {
        Self {
            min_words: 20,
            max_words: 60,
        }
    }
}

/// Interface implemented by summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Summarize `text` within `bounds`.
    async fn summarize(
        &self,
        text: &str,
        bounds: SummaryBounds,
    ) -> Result<String, SummarizationClientError>;
}

/// Build the summarization client selected by configuration.
pub fn get_summarization_client(
    config: &Config,
) -> Result<Box<dyn SummarizationClient>, SummarizationClientError> {
    let http = Client::builder()
        .user_agent("booksum/summary")
        .build()
        .map_err(|error| SummarizationClientError::Client(error.to_string()))?;
    let client: Box<dyn SummarizationClient> = match config.summarization_provider {
        SummarizationProvider::HuggingFace => Box::new(HuggingFaceSummarizationClient {
            http,
            base_url: config
                .summarization_url
                .clone()
                .unwrap_or_else(|| DEFAULT_HUGGING_FACE_URL.to_string()),
            model: config.summarization_model.clone(),
            api_token: config.summarization_api_token.clone(),
        }),
        SummarizationProvider::Ollama => Box::new(OllamaSummarizationClient {
            http,
            base_url: config
                .summarization_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: config.summarization_model.clone(),
        }),
    };
    tracing::info!(
        provider = ?config.summarization_provider,
        model = %config.summarization_model,
        "Summarization client initialized"
    );
    Ok(client)
}

/// Hugging Face inference API client.
pub struct HuggingFaceSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
    api_token: Option<String>,
}

impl HuggingFaceSummarizationClient {
    /// Create a client for `model` served at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[derive(Debug, Deserialize)]
struct HuggingFaceSummary {
    summary_text: String,
}

#[async_trait]
impl SummarizationClient for HuggingFaceSummarizationClient {
    async fn summarize(
        &self,
        text: &str,
        bounds: SummaryBounds,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "inputs": text,
            "parameters": {
                "min_length": bounds.min_words,
                "max_length": bounds.max_words,
                "do_sample": false,
            }
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|error| {
            SummarizationClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "inference API returned {status}: {body}"
            )));
        }

        let mut body: Vec<HuggingFaceSummary> = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode inference response: {error}"
            ))
        })?;
        if body.is_empty() {
            return Err(SummarizationClientError::InvalidResponse(
                "inference response contained no summaries".into(),
            ));
        }
        Ok(body.swap_remove(0).summary_text.trim().to_string())
    }
}

/// Ollama `/api/generate` client.
pub struct OllamaSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaSummarizationClient {
    /// Create a client for `model` served at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

fn build_prompt(text: &str, bounds: SummaryBounds) -> String {
    format!(
        "Summarize the following passage in plain prose between {} and {} words. \
         Return only the summary.\n\n{}",
        bounds.min_words, bounds.max_words, text
    )
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl SummarizationClient for OllamaSummarizationClient {
    async fn summarize(
        &self,
        text: &str,
        bounds: SummaryBounds,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(text, bounds),
            "stream": false,
            "options": {
                // Lower temperature for deterministic summaries.
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(SummarizationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn hugging_face_client_sends_length_bounds() {
        let server = MockServer::start_async().await;
        let client = HuggingFaceSummarizationClient::new(
            server.base_url(),
            "facebook/bart-large-cnn",
            Some("secret".into()),
        );

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/facebook/bart-large-cnn")
                    .header("authorization", "Bearer secret")
                    .json_body(json!({
                        "inputs": "Long text.",
                        "parameters": {"min_length": 20, "max_length": 60, "do_sample": false}
                    }));
                then.status(200)
                    .json_body(json!([{ "summary_text": " Short text. " }]));
            })
            .await;

        let summary = client
            .summarize("Long text.", SummaryBounds::default())
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "Short text.");
    }

    #[tokio::test]
    async fn hugging_face_client_surfaces_error_status() {
        let server = MockServer::start_async().await;
        let client = HuggingFaceSummarizationClient::new(server.base_url(), "m", None);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/m");
                then.status(503).body("loading");
            })
            .await;

        let error = client
            .summarize("text", SummaryBounds::default())
            .await
            .expect_err("error response");
        assert!(
            matches!(&error, SummarizationClientError::GenerationFailed(message) if message.contains("503")),
            "{error:?}"
        );
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client = OllamaSummarizationClient::new(server.base_url(), "llama3");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "Summary text",
                    "done": true
                }));
            })
            .await;

        let summary = client
            .summarize("Some passage.", SummaryBounds::default())
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "Summary text");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client = OllamaSummarizationClient::new(server.base_url(), "llama3");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .summarize("Some passage.", SummaryBounds::default())
            .await
            .expect_err("error response");

        assert!(
            matches!(&error, SummarizationClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[test]
    fn prompt_carries_bounds() {
        let prompt = build_prompt("Body.", SummaryBounds { min_words: 5, max_words: 9 });
        assert!(prompt.contains("between 5 and 9 words"));
        assert!(prompt.ends_with("Body."));
    }
}
