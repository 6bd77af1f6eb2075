use super::types::{RawLlmConfig, RawRigorConfig, RawSessionConfig};
use anyhow::Result;
use directories::ProjectDirs;
use rigor_core::{RigorConfig, SessionConfig};
use rigor_models::ProviderSettings;
use std::path::{Path, PathBuf};

/// Environment variable that relocates the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "RIGOR_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<RigorConfig> {
        let mut raw = RawRigorConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path() {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        raw = Self::merge_raw(raw, Self::read_raw(&Self::project_config_path())?);

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rigor").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with RIGOR_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".rigor/config.toml")
        }
    }

    /// Read one layer; a missing file is an empty layer
    fn read_raw(path: &Path) -> Result<RawRigorConfig> {
        if !path.exists() {
            return Ok(RawRigorConfig::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawRigorConfig, overlay: RawRigorConfig) -> RawRigorConfig {
        RawRigorConfig {
            llm: RawLlmConfig {
                provider: overlay.llm.provider.or(base.llm.provider),
                model: overlay.llm.model.or(base.llm.model),
                base_url: overlay.llm.base_url.or(base.llm.base_url),
            },
            session: RawSessionConfig {
                challenge_timeout_ms: overlay
                    .session
                    .challenge_timeout_ms
                    .or(base.session.challenge_timeout_ms),
                critique_timeout_ms: overlay
                    .session
                    .critique_timeout_ms
                    .or(base.session.critique_timeout_ms),
                evaluation_timeout_ms: overlay
                    .session
                    .evaluation_timeout_ms
                    .or(base.session.evaluation_timeout_ms),
                context_window: overlay
                    .session
                    .context_window
                    .or(base.session.context_window),
                challenge_count: overlay
                    .session
                    .challenge_count
                    .or(base.session.challenge_count),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawRigorConfig) -> RigorConfig {
        let defaults = SessionConfig::default();
        RigorConfig {
            llm: ProviderSettings {
                provider: raw.llm.provider.unwrap_or_default(),
                model: raw.llm.model,
                base_url: raw.llm.base_url,
            },
            session: SessionConfig {
                challenge_timeout_ms: raw
                    .session
                    .challenge_timeout_ms
                    .unwrap_or(defaults.challenge_timeout_ms),
                critique_timeout_ms: raw
                    .session
                    .critique_timeout_ms
                    .unwrap_or(defaults.critique_timeout_ms),
                evaluation_timeout_ms: raw
                    .session
                    .evaluation_timeout_ms
                    .unwrap_or(defaults.evaluation_timeout_ms),
                context_window: raw.session.context_window.unwrap_or(defaults.context_window),
                challenge_count: raw
                    .session
                    .challenge_count
                    .unwrap_or(defaults.challenge_count),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigor_models::ProviderKind;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{contents}").unwrap();
        path
    }

    #[test]
    fn test_read_missing_file_is_empty_layer() {
        let temp_dir = TempDir::new().unwrap();
        let raw = ConfigLoader::read_raw(&temp_dir.path().join("nope.toml")).unwrap();
        assert!(raw.llm.provider.is_none());
        assert!(raw.session.context_window.is_none());
    }

    #[test]
    fn test_read_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "bad.toml", "this is not valid toml {{{{");
        assert!(ConfigLoader::read_raw(&path).is_err());
    }

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawRigorConfig {
            llm: RawLlmConfig {
                provider: Some(ProviderKind::Gemini),
                model: Some("gemini-1.5-pro".to_string()),
                base_url: None,
            },
            session: RawSessionConfig {
                critique_timeout_ms: Some(6000),
                context_window: Some(5),
                ..Default::default()
            },
        };
        let overlay = RawRigorConfig {
            llm: RawLlmConfig {
                provider: Some(ProviderKind::Ollama),
                model: None,
                base_url: Some("http://gpu-box:11434".to_string()),
            },
            session: RawSessionConfig {
                critique_timeout_ms: Some(9000),
                ..Default::default()
            },
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.llm.provider, Some(ProviderKind::Ollama));
        // overlay's None falls through to base value via .or()
        assert_eq!(merged.llm.model, Some("gemini-1.5-pro".to_string()));
        assert_eq!(merged.llm.base_url, Some("http://gpu-box:11434".to_string()));
        assert_eq!(merged.session.critique_timeout_ms, Some(9000));
        assert_eq!(merged.session.context_window, Some(5));
    }

    #[test]
    fn test_finalize_applies_defaults() {
        let config = ConfigLoader::finalize(RawRigorConfig::default());
        assert_eq!(config, RigorConfig::default());
    }

    #[test]
    fn test_user_config_path_mentions_rigor() {
        let path = ConfigLoader::user_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("rigor"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_path_default() {
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::remove_var(PROJECT_CONFIG_DIR_ENV) };
        assert_eq!(
            ConfigLoader::project_config_path(),
            PathBuf::from(".rigor/config.toml")
        );
    }

    #[test]
    #[serial]
    fn test_load_reads_project_override_dir() {
        let temp_dir = TempDir::new().unwrap();
        write(
            &temp_dir,
            "config.toml",
            r#"
[llm]
provider = "offline"

[session]
evaluation_timeout_ms = 12000
"#,
        );

        // SAFETY: serialized with other env-mutating tests
        unsafe {
            std::env::set_var(PROJECT_CONFIG_DIR_ENV, temp_dir.path());
        }
        let config = ConfigLoader::load();
        unsafe {
            std::env::remove_var(PROJECT_CONFIG_DIR_ENV);
        }

        let config = config.unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Offline);
        assert_eq!(config.session.evaluation_timeout_ms, 12000);
    }
}
