//! Request and response types for model providers.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message setting context/behavior.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of input/prompt tokens.
    pub input_tokens: u64,
    /// Number of output/completion tokens.
    pub output_tokens: u64,
    /// Total tokens (input + output).
    pub total_tokens: u64,
}

impl Usage {
    /// Create new usage statistics.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Request for a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model ID to use.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 to 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON-only answer where supported.
    #[serde(default)]
    pub json_output: bool,
}

impl ChatRequest {
    /// Create a new chat request.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            json_output: false,
        }
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set the maximum tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Request JSON output.
    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Concatenated system messages, if any.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reached end of response naturally.
    EndTurn,
    /// Reached max tokens limit.
    MaxTokens,
    /// Blocked by the provider's safety filters.
    Safety,
}

/// Response from a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response text.
    pub content: String,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// Token usage statistics.
    pub usage: Usage,
}

impl ChatResponse {
    /// Create a text response that ended naturally.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_work() {
        let sys = Message::system("You are a strict reviewer");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are a strict reviewer");

        assert_eq!(Message::user("Hello").role, Role::User);
        assert_eq!(Message::assistant("Hi").role, Role::Assistant);
    }

    #[test]
    fn chat_request_builder_works() {
        let req = ChatRequest::new("gemini-2.0-flash", vec![Message::user("Hello")])
            .temperature(0.4)
            .max_tokens(512)
            .json();

        assert_eq!(req.model, "gemini-2.0-flash");
        assert_eq!(req.temperature, Some(0.4));
        assert_eq!(req.max_tokens, Some(512));
        assert!(req.json_output);
    }

    #[test]
    fn system_prompt_joins_system_messages() {
        let req = ChatRequest::new(
            "m",
            vec![
                Message::system("first"),
                Message::user("question"),
                Message::system("second"),
            ],
        );
        assert_eq!(req.system_prompt().as_deref(), Some("first\n\nsecond"));

        let req = ChatRequest::new("m", vec![Message::user("only user")]);
        assert!(req.system_prompt().is_none());
    }

    #[test]
    fn usage_calculates_total() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn stop_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StopReason::MaxTokens).unwrap();
        assert_eq!(json, "\"max_tokens\"");
    }
}
