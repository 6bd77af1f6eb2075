//! Provider that never answers.
//!
//! Every call fails with [`Error::Offline`](crate::Error::Offline), so callers
//! exercise their fallback paths without network access or credentials.

use super::{ChatRequest, ChatResponse, ModelProvider};

/// Offline provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

impl OfflineProvider {
    /// Create an offline provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ModelProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn model(&self) -> &str {
        "offline"
    }

    async fn chat(&self, _request: ChatRequest) -> crate::Result<ChatResponse> {
        Err(crate::Error::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Message;

    #[tokio::test]
    async fn chat_always_fails() {
        let provider = OfflineProvider::new();
        let result = provider
            .chat(ChatRequest::new("offline", vec![Message::user("hi")]))
            .await;
        assert!(matches!(result, Err(crate::Error::Offline)));
    }
}
