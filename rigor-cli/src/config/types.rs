use rigor_models::ProviderKind;
use serde::Deserialize;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRigorConfig {
    #[serde(default)]
    pub llm: RawLlmConfig,

    #[serde(default)]
    pub session: RawSessionConfig,
}

/// Model backend as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLlmConfig {
    /// Provider backend (gemini, ollama, offline)
    pub provider: Option<ProviderKind>,

    /// Model name
    pub model: Option<String>,

    /// Override for the provider's base URL
    pub base_url: Option<String>,
}

/// Session tuning as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionConfig {
    pub challenge_timeout_ms: Option<u64>,
    pub critique_timeout_ms: Option<u64>,
    pub evaluation_timeout_ms: Option<u64>,
    pub context_window: Option<usize>,
    pub challenge_count: Option<usize>,
}
