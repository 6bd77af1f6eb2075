//! Google Gemini provider.
//!
//! Talks to the Generative Language REST API (`models/{model}:generateContent`).
//!
//! # Example
//!
//! ```ignore
//! use rigor_models::providers::GeminiProvider;
//!
//! let provider = GeminiProvider::new(api_key, "gemini-2.0-flash");
//! let provider = provider.with_base_url("http://localhost:8089");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    ChatRequest, ChatResponse, DEFAULT_REQUEST_TIMEOUT, ModelProvider, Role, StopReason, Usage,
    http_client,
};
use crate::auth::ApiKey;

/// Default Gemini API base URL.
pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub(crate) const DEFAULT_MODEL: &str = "gemini-2.0-flash";

// ────────────────────────────────────────────────────────────────────────────
// Gemini API Types
// ────────────────────────────────────────────────────────────────────────────

/// A block of text parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// One text part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

/// Generation settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// Request body for `generateContent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

/// A response candidate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

/// Response body from `generateContent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>,
}

impl GeminiRequest {
    /// Convert a provider-neutral request.
    pub fn from_chat(request: &ChatRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        let system_instruction = request.system_prompt().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text }],
        });

        let generation_config = if request.temperature.is_some()
            || request.max_tokens.is_some()
            || request.json_output
        {
            Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request
                    .json_output
                    .then(|| "application/json".to_string()),
            })
        } else {
            None
        };

        Self {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

impl TryFrom<GeminiResponse> for ChatResponse {
    type Error = crate::Error;

    fn try_from(response: GeminiResponse) -> crate::Result<Self> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| crate::Error::EmptyResponse("no candidates".to_string()))?;

        let stop_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => StopReason::Safety,
            _ => StopReason::EndTurn,
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(crate::Error::EmptyResponse(format!(
                "candidate had no text (finish reason {stop_reason:?})"
            )));
        }

        let usage = response.usage_metadata.unwrap_or_default();
        Ok(ChatResponse {
            content: text,
            stop_reason,
            usage: Usage::new(usage.prompt_token_count, usage.candidates_token_count),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiProvider
// ────────────────────────────────────────────────────────────────────────────

/// Google Gemini provider.
pub struct GeminiProvider {
    api_key: ApiKey,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a provider against the public endpoint.
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
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

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait::async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest) -> crate::Result<ChatResponse> {
        let model = if request.model.is_empty() {
            self.model.as_str()
        } else {
            request.model.as_str()
        };
        let url = self.endpoint(model);
        let body = GeminiRequest::from_chat(&request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::Error::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::ProviderApi(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Request(e.to_string()))?;

        gemini_response.try_into()
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Message;

    #[test]
    fn request_moves_system_messages_into_instruction() {
        let chat = ChatRequest::new(
            "gemini-2.0-flash",
            vec![
                Message::system("Be terse"),
                Message::user("Hello"),
                Message::assistant("Hi"),
            ],
        )
        .json();

        let body = GeminiRequest::from_chat(&chat);
        assert_eq!(body.contents.len(), 2);
        assert_eq!(body.contents[0].role.as_deref(), Some("user"));
        assert_eq!(body.contents[1].role.as_deref(), Some("model"));
        assert_eq!(
            body.system_instruction.as_ref().unwrap().parts[0].text,
            "Be terse"
        );

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json.get("systemInstruction").is_some());
    }

    #[test]
    fn request_omits_generation_config_when_unset() {
        let chat = ChatRequest::new("m", vec![Message::user("Hello")]);
        let json = serde_json::to_value(GeminiRequest::from_chat(&chat)).unwrap();
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn response_converts_to_chat_response() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let chat: ChatResponse = response.try_into().unwrap();

        assert_eq!(chat.content, "{\"a\":1}");
        assert_eq!(chat.stop_reason, StopReason::EndTurn);
        assert_eq!(chat.usage.total_tokens, 16);
    }

    #[test]
    fn response_without_candidates_is_an_error() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let result: crate::Result<ChatResponse> = response.try_into();
        assert!(matches!(result, Err(crate::Error::EmptyResponse(_))));
    }

    #[test]
    fn safety_block_without_text_is_an_error() {
        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        let result: crate::Result<ChatResponse> = response.try_into();
        assert!(matches!(result, Err(crate::Error::EmptyResponse(msg)) if msg.contains("Safety")));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = GeminiProvider::new(ApiKey::new("k"), "m").with_base_url("http://x/v1/");
        assert_eq!(provider.base_url(), "http://x/v1");
        assert_eq!(provider.endpoint("m"), "http://x/v1/models/m:generateContent");
    }

    #[test]
    fn debug_does_not_leak_key() {
        let provider = GeminiProvider::new(ApiKey::new("AIza-very-secret"), "m");
        let debug = format!("{provider:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_request_error() {
        let provider =
            GeminiProvider::new(ApiKey::new("k"), "m").with_base_url("http://127.0.0.1:9");
        let result = provider
            .chat(ChatRequest::new("", vec![Message::user("hi")]))
            .await;
        assert!(matches!(result, Err(crate::Error::Request(_))));
    }
}
