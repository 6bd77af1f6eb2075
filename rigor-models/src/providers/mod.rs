//! Model provider trait, implementations and the factory that builds them.
//!
//! The [`ModelProvider`] trait defines the unified interface the rest of
//! rigor talks to. [`ClientFactory`] is the seam where client construction
//! can fail (for example when no API key is configured); callers decide
//! whether such a failure is fatal or absorbed.
//!
//! # Example
//!
//! ```ignore
//! use rigor_models::providers::{ChatRequest, ClientFactory, Message};
//!
//! async fn ask(factory: &dyn ClientFactory) -> rigor_models::Result<String> {
//!     let provider = factory.build()?;
//!     let request = ChatRequest::new(provider.model(), vec![Message::user("Hello!")]);
//!     Ok(provider.chat(request).await?.content)
//! }
//! ```

mod gemini;
mod offline;
mod ollama;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use gemini::GeminiProvider;
pub use offline::OfflineProvider;
pub use ollama::OllamaProvider;
pub use types::*;

use crate::Result;
use crate::auth::CredentialStore;

/// Upper bound on a single HTTP exchange with a provider.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with a total request timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "falling back to an HTTP client without timeout");
            reqwest::Client::new()
        }
    }
}

/// Trait for chat-completion providers (cloud and local).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the provider name (e.g., "gemini", "ollama").
    fn name(&self) -> &str;

    /// Model used when a request does not name one.
    fn model(&self) -> &str;

    /// Perform a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// Which provider backend to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini over the Generative Language REST API.
    #[default]
    Gemini,
    /// A local Ollama instance.
    Ollama,
    /// Never answers; every call fails.
    Offline,
}

impl ProviderKind {
    /// Provider name as used for credentials and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Offline => "offline",
        }
    }

    /// Whether building this provider needs an API key.
    pub fn requires_credentials(&self) -> bool {
        matches!(self, Self::Gemini)
    }

    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => gemini::DEFAULT_MODEL,
            Self::Ollama => ollama::DEFAULT_MODEL,
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "offline" => Ok(Self::Offline),
            other => Err(crate::Error::UnknownProvider(other.to_string())),
        }
    }
}

/// Settings needed to build a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider backend.
    pub provider: ProviderKind,
    /// Model name; the provider's default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Override for the provider's API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// Model name with the provider default applied.
    pub fn model_or_default(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Builds a provider on demand.
///
/// Construction happens per call so a key added mid-session is picked up
/// on the next attempt.
pub trait ClientFactory: Send + Sync {
    /// Build a ready-to-use provider.
    fn build(&self) -> Result<Arc<dyn ModelProvider>>;
}

/// Factory backed by [`ProviderSettings`] and a [`CredentialStore`].
pub struct ProviderFactory {
    settings: ProviderSettings,
    credentials: Arc<CredentialStore>,
}

impl ProviderFactory {
    /// Create a factory for the given settings.
    pub fn new(settings: ProviderSettings, credentials: Arc<CredentialStore>) -> Self {
        Self {
            settings,
            credentials,
        }
    }

    /// Settings this factory builds from.
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }
}

impl ClientFactory for ProviderFactory {
    fn build(&self) -> Result<Arc<dyn ModelProvider>> {
        let model = self.settings.model_or_default().to_string();
        debug!(provider = %self.settings.provider, model = %model, "building model client");

        let provider: Arc<dyn ModelProvider> = match self.settings.provider {
            ProviderKind::Gemini => {
                let key = self.credentials.get(ProviderKind::Gemini.as_str())?;
                let mut provider = GeminiProvider::new(key, model);
                if let Some(url) = &self.settings.base_url {
                    provider = provider.with_base_url(url);
                }
                Arc::new(provider)
            }
            ProviderKind::Ollama => {
                let url = self
                    .settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| ollama::DEFAULT_BASE_URL.to_string());
                Arc::new(OllamaProvider::with_base_url(url).with_model(model))
            }
            ProviderKind::Offline => Arc::new(OfflineProvider::new()),
        };

        Ok(provider)
    }
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("provider", &self.settings.provider)
            .field("model", &self.settings.model_or_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("Google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("offline".parse::<ProviderKind>().unwrap(), ProviderKind::Offline);
        assert!(matches!(
            "bard".parse::<ProviderKind>(),
            Err(Error::UnknownProvider(name)) if name == "bard"
        ));
    }

    #[test]
    fn only_gemini_requires_credentials() {
        assert!(ProviderKind::Gemini.requires_credentials());
        assert!(!ProviderKind::Ollama.requires_credentials());
        assert!(!ProviderKind::Offline.requires_credentials());
    }

    #[test]
    fn settings_apply_default_model() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.model_or_default(), gemini::DEFAULT_MODEL);

        let settings = ProviderSettings {
            provider: ProviderKind::Ollama,
            model: Some("llama3.2".to_string()),
            base_url: None,
        };
        assert_eq!(settings.model_or_default(), "llama3.2");
    }

    #[test]
    fn settings_deserialize_from_toml_like_json() {
        let settings: ProviderSettings =
            serde_json::from_str(r#"{"provider":"ollama","base_url":"http://box:11434"}"#)
                .unwrap();
        assert_eq!(settings.provider, ProviderKind::Ollama);
        assert_eq!(settings.base_url.as_deref(), Some("http://box:11434"));
        assert!(settings.model.is_none());
    }

    #[test]
    fn factory_builds_offline_without_credentials() {
        let factory = ProviderFactory::new(
            ProviderSettings {
                provider: ProviderKind::Offline,
                ..Default::default()
            },
            Arc::new(CredentialStore::new("rigor-test-nonexistent")),
        );
        let provider = factory.build().unwrap();
        assert_eq!(provider.name(), "offline");
    }

    #[test]
    fn factory_builds_ollama_with_custom_model() {
        let factory = ProviderFactory::new(
            ProviderSettings {
                provider: ProviderKind::Ollama,
                model: Some("qwen2.5".to_string()),
                base_url: Some("http://127.0.0.1:9".to_string()),
            },
            Arc::new(CredentialStore::new("rigor-test-nonexistent")),
        );
        let provider = factory.build().unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "qwen2.5");
    }

    #[test]
    fn factory_fails_for_gemini_without_key() {
        let factory = ProviderFactory::new(
            ProviderSettings::default(),
            Arc::new(CredentialStore::new("rigor-test-nonexistent")),
        );
        let result = factory.build();
        assert!(matches!(result, Err(Error::CredentialsNotFound(p)) if p == "gemini"));
    }
}
