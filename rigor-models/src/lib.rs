//! Model access for rigor.
//!
//! This crate provides:
//! - A provider trait for a unified chat-completion interface
//! - Gemini, Ollama and offline provider implementations
//! - Credential management for API keys
//! - A [`ClientFactory`](providers::ClientFactory) that turns settings into a ready provider
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ProviderFactory                     │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  │
//! │  │   Gemini    │  │   Ollama    │  │   Offline   │  │
//! │  │  Provider   │  │  Provider   │  │  Provider   │  │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  CredentialStore                     │
//! │         (System Keyring + Env Fallback)             │
//! └─────────────────────────────────────────────────────┘
//! ```

mod error;

pub mod auth;
pub mod providers;

pub use error::{Error, Result};
pub use providers::{
    ChatRequest, ChatResponse, ClientFactory, Message, ModelProvider, ProviderFactory,
    ProviderKind, ProviderSettings, Role,
};
