//! Per-step critique service.
//!
//! Sends the current step, a suffix window of earlier steps and the
//! challenge to the model, and returns a pointed follow-up plus a depth
//! score. Timeouts, provider errors and malformed answers become
//! [`Critique::fallback`]; only a client that cannot be built is reported
//! to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rigor_models::ClientFactory;
use tracing::{debug, info};

use crate::error::CritiqueError;
use crate::guard::guard_with_outcome;
use crate::prompt;
use crate::types::{Challenge, Critique, NEUTRAL_DEPTH_SCORE, Step};

/// Default deadline for one critique.
pub const DEFAULT_CRITIQUE_TIMEOUT: Duration = Duration::from_secs(4);

/// Default number of earlier steps sent as context.
pub const DEFAULT_CONTEXT_WINDOW: usize = 3;

/// Follow-up used when no real critique could be obtained.
pub const FALLBACK_CRITIQUE: &str = "Can you elaborate on the trade-offs of this approach? \
What breaks first as load grows, and how would you detect it?";

impl Critique {
    /// Generic follow-up with a neutral score.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_CRITIQUE, NEUTRAL_DEPTH_SCORE)
    }
}

/// Anything that can critique a step.
#[async_trait]
pub trait Critic: Send + Sync {
    /// Critique `current` in the light of `prior` steps.
    ///
    /// Returns `Err` only when the call could not be attempted at all.
    async fn critique(
        &self,
        current: &str,
        prior: &[Step],
        challenge: &Challenge,
    ) -> Result<Critique, CritiqueError>;
}

/// The last `window` steps of `prior`.
pub fn context_window(prior: &[Step], window: usize) -> &[Step] {
    &prior[prior.len().saturating_sub(window)..]
}

/// Model-backed critic.
pub struct CritiqueService {
    factory: Arc<dyn ClientFactory>,
    deadline: Duration,
    window: usize,
}

impl CritiqueService {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            deadline: DEFAULT_CRITIQUE_TIMEOUT,
            window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

#[async_trait]
impl Critic for CritiqueService {
    async fn critique(
        &self,
        current: &str,
        prior: &[Step],
        challenge: &Challenge,
    ) -> Result<Critique, CritiqueError> {
        let provider = self.factory.build().map_err(CritiqueError::Client)?;

        let window = context_window(prior, self.window);
        debug!(
            prior = prior.len(),
            sent = window.len(),
            "requesting critique"
        );
        let request = prompt::critique_request(provider.model(), challenge, window, current);
        let operation = async move {
            let response = provider.chat(request).await?;
            prompt::parse_critique(&response.content)
        };

        let guarded = guard_with_outcome(operation, self.deadline, Critique::fallback()).await;
        info!(
            depth_score = guarded.value.depth_score,
            outcome = ?guarded.outcome,
            elapsed_ms = guarded.elapsed.as_millis() as u64,
            "critique settled"
        );
        Ok(guarded.value)
    }
}
