//! rigor-core: Session orchestration for the rigor design-interview trainer
//!
//! This crate provides the parts of a practice session that sit between a
//! front end and the model:
//!
//! - **Step state machine** - [`Session`] applies [`Event`]s and returns [`Effect`]s
//! - **Deadline guard** - [`guard`] races a call against a timer and falls back
//! - **Services** - [`ChallengeProvider`], [`CritiqueService`] and [`SessionEvaluator`]
//! - **Orchestrator** - [`Orchestrator`] wires the services to a session and
//!   broadcasts [`SessionEvent`]s
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rigor_core::{Orchestrator, RigorConfig, SubmitOutcome};
//! use rigor_models::auth::CredentialStore;
//! use rigor_models::ProviderFactory;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RigorConfig::default();
//!     let credentials = Arc::new(CredentialStore::new("rigor").with_env_fallback());
//!     let factory = Arc::new(ProviderFactory::new(config.llm.clone(), credentials));
//!     let orchestrator = Orchestrator::from_config(&config, factory);
//!
//!     let challenge = orchestrator.list_challenges().await.remove(0);
//!     let step = orchestrator.start_session(challenge).await;
//!     orchestrator.edit_step(step, "Shard by user id").await?;
//!     if let SubmitOutcome::Critiqued { critique, .. } = orchestrator.submit_step(step).await? {
//!         println!("{} ({}/10)", critique.text, critique.depth_score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Orchestrator                    │
//! │  ┌─────────────────────────────────────────────┐│
//! │  │     Session (pure state machine)            ││
//! │  └─────────────────────────────────────────────┘│
//! │  ┌────────────┐ ┌──────────────┐ ┌────────────┐ │
//! │  │ Challenges │ │   Critique   │ │ Evaluator  │ │
//! │  └─────┬──────┘ └──────┬───────┘ └─────┬──────┘ │
//! └────────┼───────────────┼───────────────┼────────┘
//!          └───────── guard(deadline) ─────┘
//!                          │
//!                          ▼
//!                rigor_models::ModelProvider
//! ```

pub mod challenge;
pub mod config;
pub mod critique;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod guard;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod testing;
pub mod types;

// Re-export key types for convenience
pub use challenge::{ChallengeProvider, ChallengeSource, fallback_catalog};
pub use config::{RigorConfig, SessionConfig};
pub use critique::{Critic, CritiqueService};
pub use error::{CritiqueError, Error, Result, SessionError};
pub use evaluator::{Grader, SessionEvaluator};
pub use events::SessionEvent;
pub use guard::{GuardOutcome, Guarded, guard, guard_with_outcome};
pub use orchestrator::{Orchestrator, SubmitOutcome};
pub use session::{Effect, Event, MIN_CRITIQUED_STEPS, Session, SessionSnapshot, Ticket};
pub use types::{
    Challenge, ChallengeId, Critique, Difficulty, SessionResult, Step, StepId, StepState,
};
