//! Error types for model access.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or calling a model provider.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider name is not one we know how to build.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Credentials not found for provider.
    #[error("credentials not found for provider: {0}")]
    CredentialsNotFound(String),

    /// Failed to access system keyring.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Provider API error.
    #[error("provider API error: {0}")]
    ProviderApi(String),

    /// Provider answered but the body held no usable text.
    #[error("empty response from provider: {0}")]
    EmptyResponse(String),

    /// Request failed.
    #[error("request failed: {0}")]
    Request(String),

    /// Provider is configured to never answer.
    #[error("provider is offline")]
    Offline,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
