//! Ollama local model provider.
//!
//! Connects to a local Ollama instance for running models like Llama, Mistral, etc.
//!
//! # Example
//!
//! ```ignore
//! use rigor_models::providers::OllamaProvider;
//!
//! let provider = OllamaProvider::new();  // Uses localhost:11434
//! let provider = OllamaProvider::with_base_url("http://192.168.1.100:11434");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    ChatRequest, ChatResponse, DEFAULT_REQUEST_TIMEOUT, ModelProvider, Role, StopReason, Usage,
    http_client,
};

/// Default Ollama API base URL.
pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Model used when none is configured.
pub(crate) const DEFAULT_MODEL: &str = "llama3.1";

// ────────────────────────────────────────────────────────────────────────────
// Ollama API Types
// ────────────────────────────────────────────────────────────────────────────

/// Message in an Ollama chat request/response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OllamaChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body for Ollama's `/api/chat` endpoint.
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaChatOptions>,
}

/// Chat options for Ollama.
#[derive(Debug, Serialize)]
pub struct OllamaChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Response from Ollama's `/api/chat` endpoint.
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub message: OllamaChatMessage,
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl From<OllamaChatResponse> for ChatResponse {
    fn from(response: OllamaChatResponse) -> Self {
        Self {
            content: response.message.content,
            stop_reason: match response.done_reason.as_deref() {
                Some("length") => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            },
            usage: Usage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
        }
    }
}

impl OllamaChatRequest {
    /// Convert a provider-neutral request.
    pub fn from_chat(request: ChatRequest, fallback_model: &str) -> Self {
        let messages = request
            .messages
            .iter()
            .map(|m| OllamaChatMessage {
                role: match m.role {
                    Role::System => "system".to_string(),
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        Self {
            model: if request.model.is_empty() {
                fallback_model.to_string()
            } else {
                request.model
            },
            messages,
            stream: false,
            format: request.json_output.then(|| "json".to_string()),
            options,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OllamaProvider
// ────────────────────────────────────────────────────────────────────────────

/// Ollama local model provider.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default URL (localhost:11434).
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new Ollama provider with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: http_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Set the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every HTTP exchange by `timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Get the base URL for this provider.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest) -> crate::Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let ollama_request = OllamaChatRequest::from_chat(request, &self.model);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| crate::Error::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::ProviderApi(format!(
                "Ollama API returned {}: {}",
                status, body
            )));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Request(e.to_string()))?;

        Ok(ollama_response.into())
    }
}
