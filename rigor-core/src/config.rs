//! Configuration types.
//!
//! Provides the model backend settings and the per-call deadlines and
//! context sizes used by a practice session.

use std::time::Duration;

use rigor_models::ProviderSettings;
use serde::{Deserialize, Serialize};

use crate::challenge::{DEFAULT_CHALLENGE_COUNT, DEFAULT_CHALLENGE_TIMEOUT};
use crate::critique::{DEFAULT_CONTEXT_WINDOW, DEFAULT_CRITIQUE_TIMEOUT};
use crate::evaluator::DEFAULT_EVALUATION_TIMEOUT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigorConfig {
    /// Model backend.
    pub llm: ProviderSettings,
    /// Session tuning.
    pub session: SessionConfig,
}

/// Deadlines and context sizes for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for listing challenges, in milliseconds.
    pub challenge_timeout_ms: u64,
    /// Deadline for one step critique, in milliseconds.
    pub critique_timeout_ms: u64,
    /// Deadline for the final evaluation, in milliseconds.
    pub evaluation_timeout_ms: u64,
    /// Number of earlier steps sent along with a critique request.
    pub context_window: usize,
    /// Number of challenges requested from the model.
    pub challenge_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            challenge_timeout_ms: DEFAULT_CHALLENGE_TIMEOUT.as_millis() as u64,
            critique_timeout_ms: DEFAULT_CRITIQUE_TIMEOUT.as_millis() as u64,
            evaluation_timeout_ms: DEFAULT_EVALUATION_TIMEOUT.as_millis() as u64,
            context_window: DEFAULT_CONTEXT_WINDOW,
            challenge_count: DEFAULT_CHALLENGE_COUNT,
        }
    }
}

impl SessionConfig {
    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_timeout_ms)
    }

    pub fn critique_timeout(&self) -> Duration {
        Duration::from_millis(self.critique_timeout_ms)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigor_models::ProviderKind;

    #[test]
    fn defaults_match_recommended_deadlines() {
        let config = SessionConfig::default();
        assert_eq!(config.challenge_timeout(), Duration::from_millis(1500));
        assert_eq!(config.critique_timeout(), Duration::from_secs(4));
        assert_eq!(config.evaluation_timeout(), Duration::from_secs(8));
        assert_eq!(config.context_window, 3);
        assert_eq!(config.challenge_count, 3);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RigorConfig = toml::from_str(
            r#"
            [llm]
            provider = "ollama"

            [session]
            critique_timeout_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.session.critique_timeout(), Duration::from_secs(10));
        assert_eq!(config.session.evaluation_timeout(), Duration::from_secs(8));
        assert_eq!(config.session.context_window, 3);
    }

    #[test]
    fn empty_toml_is_default() {
        let config: RigorConfig = toml::from_str("").unwrap();
        assert_eq!(config, RigorConfig::default());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = RigorConfig::default();
        config.llm.model = Some("gemini-1.5-pro".to_string());
        config.session.challenge_count = 5;

        let text = toml::to_string(&config).unwrap();
        let parsed: RigorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
