//! Error types for rigor-core

use thiserror::Error;

use crate::types::StepId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single external call.
///
/// These never reach the session: the deadline guard turns them into
/// fallback values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Model error: {0}")]
    Model(#[from] rigor_models::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Illegal operations on a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No session has been started")]
    NotStarted,

    #[error("Session is already finalized")]
    Finalized,

    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    #[error("Invalid state for step {step}: expected {expected}, got {actual}")]
    InvalidState {
        step: StepId,
        expected: String,
        actual: String,
    },

    #[error("A critique request is already in flight")]
    CritiqueInFlight,

    #[error("Session evaluation is already in progress")]
    FinalizationPending,

    #[error("Session needs at least {required} critiqued steps to be evaluated, has {critiqued}")]
    NotEvaluable { critiqued: usize, required: usize },

    #[error("Session evaluation failed, try again: {0}")]
    EvaluationFailed(String),

    #[error("Session was restarted while the request was in flight")]
    Superseded,
}

/// The critique call could not even be attempted.
#[derive(Error, Debug)]
pub enum CritiqueError {
    #[error("Could not build model client: {0}")]
    Client(#[source] rigor_models::Error),
}
