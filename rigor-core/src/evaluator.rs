//! Whole-session evaluation.
//!
//! [`SessionEvaluator`] grades the transcript of a finished session. Like
//! the other call sites it always produces a value: a missing client, a
//! timeout or a malformed answer yield [`SessionResult::unavailable`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rigor_models::ClientFactory;
use tracing::{info, warn};

use crate::error::Result;
use crate::guard::{GuardOutcome, guard_with_outcome};
use crate::prompt;
use crate::types::{Challenge, SessionResult, Step, StepState};

/// Default deadline for a session evaluation.
pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(8);

/// Summary used when the evaluation deadline passed.
pub const TIMEOUT_SUMMARY: &str =
    "Evaluation timed out before the grader answered; this session could not be scored.";

/// Summary used when the grader failed or answered nonsense.
pub const FAILURE_SUMMARY: &str =
    "Evaluation could not be completed because the grading service was unavailable.";

/// Anything that can grade a finished session.
#[async_trait]
pub trait Grader: Send + Sync {
    /// Grade `steps` (already filtered with [`graded_steps`]).
    async fn evaluate(&self, steps: &[Step], challenge: &Challenge) -> Result<SessionResult>;
}

/// Steps that count towards the evaluation.
///
/// Every critiqued step, plus a trailing open step when it has content.
pub fn graded_steps(steps: &[Step]) -> Vec<Step> {
    let mut graded: Vec<Step> = steps.iter().filter(|s| s.is_critiqued()).cloned().collect();
    if let Some(last) = steps.last()
        && last.state == StepState::Open
        && !last.is_blank()
    {
        graded.push(last.clone());
    }
    graded
}

/// Model-backed grader.
pub struct SessionEvaluator {
    factory: Arc<dyn ClientFactory>,
    deadline: Duration,
}

impl SessionEvaluator {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            deadline: DEFAULT_EVALUATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

#[async_trait]
impl Grader for SessionEvaluator {
    async fn evaluate(&self, steps: &[Step], challenge: &Challenge) -> Result<SessionResult> {
        let provider = match self.factory.build() {
            Ok(provider) => provider,
            Err(e) => {
                warn!(error = %e, "model client unavailable, session not graded");
                return Ok(SessionResult::unavailable(FAILURE_SUMMARY));
            }
        };

        let request = prompt::evaluation_request(provider.model(), challenge, steps);
        let operation = async move {
            let response = provider.chat(request).await?;
            prompt::parse_evaluation(&response.content)
        };

        let guarded = guard_with_outcome(
            operation,
            self.deadline,
            SessionResult::unavailable(TIMEOUT_SUMMARY),
        )
        .await;

        let result = match guarded.outcome {
            GuardOutcome::Failed => SessionResult::unavailable(FAILURE_SUMMARY),
            _ => guarded.value,
        };

        info!(
            score = result.score,
            steps = steps.len(),
            outcome = ?guarded.outcome,
            elapsed_ms = guarded.elapsed.as_millis() as u64,
            "session evaluated"
        );
        Ok(result)
    }
}
