//! API credential management.
//!
//! Keys are stored in the system keyring under the `rigor` service; the
//! provider environment variables are consulted as a fallback.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use dialoguer::{Password, theme::ColorfulTheme};
use rigor_models::ProviderKind;
use rigor_models::auth::env_vars_for_provider;

use super::credential_store;

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store an API key in the system keyring
    Set {
        /// Provider to configure (e.g., gemini)
        #[arg(default_value = "gemini")]
        provider: String,
    },
    /// Delete a stored API key
    Delete {
        /// Provider whose key to delete
        #[arg(default_value = "gemini")]
        provider: String,
    },
    /// Show where each provider's key comes from
    Status,
}

pub fn run(args: AuthArgs) -> Result<()> {
    match args.command {
        AuthCommand::Set { provider } => set_key(&provider),
        AuthCommand::Delete { provider } => delete_key(&provider),
        AuthCommand::Status => status(),
    }
}

/// Parse a provider name and make sure it takes a key.
fn keyed_provider(name: &str) -> Result<ProviderKind> {
    let kind: ProviderKind = name.parse()?;
    if !kind.requires_credentials() {
        bail!("Provider '{}' does not use an API key", kind);
    }
    Ok(kind)
}

fn set_key(provider: &str) -> Result<()> {
    let kind = keyed_provider(provider)?;
    let store = credential_store();

    let env_hint = env_hint(kind);
    println!("Enter API key for {}{}", kind, env_hint);

    let key = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("API key")
        .interact()?;

    if key.trim().is_empty() {
        bail!("API key cannot be empty");
    }

    store.set(kind.as_str(), key.trim())?;
    println!("Credentials for '{}' saved to keyring.", kind);
    Ok(())
}

fn delete_key(provider: &str) -> Result<()> {
    let kind = keyed_provider(provider)?;
    match credential_store().delete(kind.as_str()) {
        Ok(()) => println!("Credentials for '{}' deleted.", kind),
        Err(rigor_models::Error::CredentialsNotFound(_)) => {
            println!("No credentials found for '{}'.", kind);
        }
        Err(e) => bail!("Failed to delete credentials: {}", e),
    }
    Ok(())
}

fn status() -> Result<()> {
    let store = credential_store();
    let keyed = [ProviderKind::Gemini];

    println!("API credentials:");
    println!();
    for kind in keyed {
        match store.credential_source(kind.as_str()) {
            Some(source) => println!("  {:<8} configured ({})", kind, source),
            None => println!("  {:<8} not configured{}", kind, env_hint(kind)),
        }
    }
    println!();
    println!("Providers without keys: ollama, offline");
    Ok(())
}

fn env_hint(kind: ProviderKind) -> String {
    let vars = env_vars_for_provider(kind.as_str());
    if vars.is_empty() {
        String::new()
    } else {
        format!(" (or set {})", vars.join(" / "))
    }
}
