//! Chat-completion client
//!
//! The pipeline only needs "send these messages, get text back", so the
//! upstream service sits behind [`CompletionClient`]. [`OpenAiClient`] talks
//! to any OpenAI-compatible `/chat/completions` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Instructions are sent with the `developer` role, which reasoning
    /// models treat as the system channel.
    pub fn developer(content: impl Into<String>) -> Self {
        Self {
            role: "developer".to_string(),
            content: content.into(),
        }
    }
}

/// One completion round-trip.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the text of the first choice. Missing content is an upstream
    /// failure, not an empty string.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Builds a client bound to the caller's API key.
pub trait ClientFactory: Send + Sync {
    fn client(&self, api_key: &str) -> Arc<dyn CompletionClient>;
}

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    /// Base URL without the trailing `/chat/completions`
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "o3-mini".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Shares one connection pool across every request's client.
#[derive(Clone)]
pub struct OpenAiClientFactory {
    http: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiClientFactory {
    /// Fails when the TLS backend cannot be initialised; the configured
    /// timeout is never dropped silently.
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(PipelineError::HttpClient)?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &OpenAiSettings {
        &self.settings
    }

    /// Client for one caller's key, sharing this factory's pool.
    pub fn build(&self, api_key: &str) -> OpenAiClient {
        OpenAiClient {
            http: self.http.clone(),
            endpoint: format!("{}/chat/completions", self.settings.base_url),
            model: self.settings.model.clone(),
            api_key: api_key.to_string(),
        }
    }
}

impl ClientFactory for OpenAiClientFactory {
    fn client(&self, api_key: &str) -> Arc<dyn CompletionClient> {
        Arc::new(self.build(api_key))
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Upstream(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "no error detail".to_string());
            return Err(PipelineError::Upstream(format!("HTTP {}: {}", status, detail)));
        }

        extract_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a completion response body.
fn extract_content(body: &str) -> Result<String> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Upstream(format!("malformed completion response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| PipelineError::Upstream("completion has no content".to_string()))
}
