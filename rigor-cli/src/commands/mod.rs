pub mod auth;
pub mod challenges;
pub mod config;
pub mod practice;

use std::sync::Arc;

use anyhow::Result;
use rigor_core::{Orchestrator, RigorConfig};
use rigor_models::auth::CredentialStore;
use rigor_models::{ProviderFactory, ProviderKind};
use tracing::debug;

use crate::config::ConfigLoader;

/// Keyring service holding API keys.
pub const KEYRING_SERVICE: &str = "rigor";

/// Credential store shared by every command.
pub fn credential_store() -> CredentialStore {
    CredentialStore::new(KEYRING_SERVICE).with_env_fallback()
}

/// Load config and build an orchestrator over the configured provider.
///
/// `offline` forces the offline provider regardless of config.
pub fn build_orchestrator(offline: bool) -> Result<(RigorConfig, Orchestrator)> {
    let mut config = ConfigLoader::load()?;
    if offline {
        config.llm.provider = ProviderKind::Offline;
    }
    debug!(
        provider = %config.llm.provider,
        model = %config.llm.model_or_default(),
        "building orchestrator"
    );

    let factory = ProviderFactory::new(config.llm.clone(), Arc::new(credential_store()));
    let orchestrator = Orchestrator::from_config(&config, Arc::new(factory));
    Ok((config, orchestrator))
}
