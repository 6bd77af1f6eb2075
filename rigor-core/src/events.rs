//! Events broadcast by the orchestrator.
//!
//! Front ends subscribe to these to show in-flight state ("critiquing
//! step 3...", "grading in progress") without polling the session.

use serde::{Deserialize, Serialize};

use crate::types::{ChallengeId, Critique, SessionResult, StepId};

/// Capacity of the orchestrator's broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session started on a challenge.
    Started { challenge: ChallengeId, first: StepId },

    /// An open step's content changed.
    StepEdited { step: StepId },

    /// A step was submitted and its critique requested.
    CritiqueRequested { step: StepId, position: u32 },

    /// A step was critiqued and a new open step appended.
    StepCritiqued {
        step: StepId,
        critique: Critique,
        next: StepId,
    },

    /// A step went back to open because no critique could be requested.
    StepReverted { step: StepId, reason: String },

    /// The session was sent for grading.
    EvaluationRequested { steps: usize },

    /// The session is finished.
    Finalized { result: SessionResult },

    /// Grading failed; the session can be finished again.
    FinalizationFailed { reason: String },

    /// All session state was cleared.
    Cleared,
}
