//! Scripted model provider for tests and offline demos.
//!
//! Queue replies with [`ScriptedProvider::respond`] / [`ScriptedProvider::fail`]
//! before driving a service. Each `chat()` consumes one queued reply after the
//! configured delay, which lets deadline behaviour be tested with paused time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rigor_models::{ChatRequest, ChatResponse, ClientFactory, ModelProvider};

enum Reply {
    Text(String),
    Error(String),
}

/// Model provider that replays queued replies.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    delay: Duration,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful text reply.
    #[must_use]
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()));
        self
    }

    /// Queue a provider error.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Reply::Error(message.into()));
        self
    }

    /// Delay applied before every reply.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared log of every request received.
    pub fn requests(&self) -> Arc<Mutex<Vec<ChatRequest>>> {
        Arc::clone(&self.requests)
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(&self, request: ChatRequest) -> rigor_models::Result<ChatResponse> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
        let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            Some(Reply::Text(text)) => Ok(ChatResponse::text(text)),
            Some(Reply::Error(message)) => Err(rigor_models::Error::ProviderApi(message)),
            None => Err(rigor_models::Error::ProviderApi(
                "no scripted reply queued".to_string(),
            )),
        }
    }
}

/// Factory that hands out a shared [`ScriptedProvider`], or fails to build.
pub struct ScriptedFactory {
    provider: Option<Arc<ScriptedProvider>>,
}

impl ScriptedFactory {
    /// Factory that always builds `provider`.
    pub fn with(provider: ScriptedProvider) -> Arc<Self> {
        Arc::new(Self {
            provider: Some(Arc::new(provider)),
        })
    }

    /// Factory whose construction fails as if no API key were configured.
    pub fn missing_credentials() -> Arc<Self> {
        Arc::new(Self { provider: None })
    }
}

impl ClientFactory for ScriptedFactory {
    fn build(&self) -> rigor_models::Result<Arc<dyn ModelProvider>> {
        match &self.provider {
            Some(provider) => Ok(Arc::clone(provider) as Arc<dyn ModelProvider>),
            None => Err(rigor_models::Error::CredentialsNotFound(
                "gemini".to_string(),
            )),
        }
    }
}
