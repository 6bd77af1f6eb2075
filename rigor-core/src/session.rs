//! Session state machine.
//!
//! [`Session`] owns the active challenge, the ordered arena of steps and the
//! final result. It performs no I/O: [`Session::apply`] takes an [`Event`],
//! updates state and returns the single [`Effect`] the caller must carry
//! out (usually "go ask the model for something").
//!
//! ```text
//!            submit (non-blank)           critique ready
//!   Open ─────────────────────▶ Awaiting ───────────────▶ Critiqued
//!    ▲                           Critique                  (+ new Open step)
//!    └──────────────────────────────┘
//!           critique unavailable
//! ```
//!
//! Outbound requests carry a [`Ticket`]. Only one request is in flight at a
//! time, and a reply whose ticket does not match it (because the session was
//! restarted or the request superseded) is dropped as [`Effect::Discarded`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::evaluator::graded_steps;
use crate::types::{Challenge, Critique, SessionResult, Step, StepId, StepState};

/// Fewest critiqued steps a session needs before it can be evaluated.
pub const MIN_CRITIQUED_STEPS: usize = 2;

/// Identifies one outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    generation: u64,
    seq: u64,
}

/// The request currently awaiting a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Critique { ticket: Ticket, step: StepId },
    Evaluation { ticket: Ticket },
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum Event {
    /// Begin a new session on `challenge`, discarding any previous one.
    Start(Challenge),
    /// Replace a step's content.
    Edit { step: StepId, text: String },
    /// Submit a step for critique.
    Submit { step: StepId },
    /// The critique call settled with a value (real or fallback).
    CritiqueReady { ticket: Ticket, critique: Critique },
    /// The critique call could not be made.
    CritiqueUnavailable { ticket: Ticket, reason: String },
    /// Ask for the session to be evaluated.
    Finish,
    /// The evaluation call settled with a value (real or fallback).
    EvaluationReady {
        ticket: Ticket,
        result: SessionResult,
    },
    /// The evaluation call failed outside its deadline guard.
    EvaluationFailed { ticket: Ticket, reason: String },
    /// Return to the pre-session state.
    Restart,
}

/// A critique the caller must request.
#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueRequest {
    pub ticket: Ticket,
    pub step: StepId,
    pub content: String,
    /// Every step before the submitted one, in order.
    pub prior: Vec<Step>,
    pub challenge: Challenge,
}

/// An evaluation the caller must request.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub ticket: Ticket,
    pub steps: Vec<Step>,
    pub challenge: Challenge,
}

/// Outputs of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A session started with its first open step.
    Started { first: StepId },
    /// Content of an open step was replaced.
    Edited { step: StepId },
    /// Nothing changed (blank submission, edit of a critiqued step).
    Unchanged,
    /// Ask the critic.
    RequestCritique(CritiqueRequest),
    /// A step was critiqued and its successor appended.
    StepCritiqued {
        step: StepId,
        critique: Critique,
        next: StepId,
    },
    /// A submitted step went back to open.
    StepReverted { step: StepId, reason: String },
    /// Ask the grader.
    RequestEvaluation(EvaluationRequest),
    /// The session is finished.
    Finalized(SessionResult),
    /// Evaluation failed; the session is still open for another attempt.
    FinalizationAborted { reason: String },
    /// A stale reply was ignored.
    Discarded,
    /// Everything was cleared.
    Cleared,
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub challenge: Option<Challenge>,
    pub steps: Vec<Step>,
    pub result: Option<SessionResult>,
    pub average_depth: Option<f64>,
    pub finalizing: bool,
}

/// One training session.
#[derive(Debug, Default)]
pub struct Session {
    challenge: Option<Challenge>,
    steps: Vec<Step>,
    result: Option<SessionResult>,
    in_flight: Option<InFlight>,
    generation: u64,
    next_seq: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// Steps in position order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// The trailing step if it is editable.
    pub fn open_step(&self) -> Option<&Step> {
        self.steps.last().filter(|s| s.state == StepState::Open)
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.challenge.is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.result.is_some()
    }

    /// A critique request is outstanding.
    pub fn is_awaiting_critique(&self) -> bool {
        matches!(self.in_flight, Some(InFlight::Critique { .. }))
    }

    /// An evaluation request is outstanding.
    pub fn is_finalizing(&self) -> bool {
        matches!(self.in_flight, Some(InFlight::Evaluation { .. }))
    }

    pub fn critiqued_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_critiqued()).count()
    }

    /// Whether [`Event::Finish`] would currently be accepted.
    pub fn can_finish(&self) -> bool {
        self.is_started()
            && !self.is_finalized()
            && self.in_flight.is_none()
            && self.critiqued_count() >= MIN_CRITIQUED_STEPS
    }

    /// Mean depth score over critiqued steps.
    pub fn average_depth(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .steps
            .iter()
            .filter_map(|s| s.depth_score)
            .map(f64::from)
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            challenge: self.challenge.clone(),
            steps: self.steps.clone(),
            result: self.result.clone(),
            average_depth: self.average_depth(),
            finalizing: self.is_finalizing(),
        }
    }

    /// Apply one event.
    pub fn apply(&mut self, event: Event) -> Result<Effect, SessionError> {
        match event {
            Event::Start(challenge) => Ok(Effect::Started {
                first: self.start(challenge),
            }),
            Event::Restart => {
                self.reset();
                info!(generation = self.generation, "session cleared");
                Ok(Effect::Cleared)
            }
            Event::Edit { step, text } => self.edit(step, text),
            Event::Submit { step } => self.submit(step),
            Event::CritiqueReady { ticket, critique } => Ok(self.critique_ready(ticket, critique)),
            Event::CritiqueUnavailable { ticket, reason } => {
                Ok(self.critique_unavailable(ticket, reason))
            }
            Event::Finish => self.finish().map(Effect::RequestEvaluation),
            Event::EvaluationReady { ticket, result } => Ok(self.evaluation_ready(ticket, result)),
            Event::EvaluationFailed { ticket, reason } => {
                Ok(self.evaluation_failed(ticket, reason))
            }
        }
    }

    fn reset(&mut self) {
        self.challenge = None;
        self.steps.clear();
        self.result = None;
        self.in_flight = None;
        self.generation += 1;
    }

    /// Begin a session on `challenge`, returning the first step's id.
    pub fn start(&mut self, challenge: Challenge) -> StepId {
        self.reset();
        info!(challenge = %challenge.id, generation = self.generation, "session started");
        self.challenge = Some(challenge);
        let first = Step::open(1);
        let id = first.id;
        self.steps.push(first);
        id
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_seq += 1;
        Ticket {
            generation: self.generation,
            seq: self.next_seq,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if !self.is_started() {
            return Err(SessionError::NotStarted);
        }
        if self.is_finalized() {
            return Err(SessionError::Finalized);
        }
        Ok(())
    }

    fn index_of(&self, id: StepId) -> Result<usize, SessionError> {
        self.steps
            .iter()
            .position(|s| s.id == id)
            .ok_or(SessionError::StepNotFound(id))
    }

    fn edit(&mut self, id: StepId, text: String) -> Result<Effect, SessionError> {
        self.ensure_active()?;
        let idx = self.index_of(id)?;
        // The graded transcript was captured at finish.
        if let Some(InFlight::Evaluation { .. }) = self.in_flight {
            return Err(SessionError::FinalizationPending);
        }
        let step = &mut self.steps[idx];

        match step.state {
            StepState::Open => {
                step.content = text;
                Ok(Effect::Edited { step: id })
            }
            StepState::Critiqued => {
                debug!(step = %id, "ignoring edit of critiqued step");
                Ok(Effect::Unchanged)
            }
            StepState::AwaitingCritique => Err(SessionError::CritiqueInFlight),
        }
    }

    fn submit(&mut self, id: StepId) -> Result<Effect, SessionError> {
        self.ensure_active()?;
        let idx = self.index_of(id)?;

        match self.in_flight {
            Some(InFlight::Critique { .. }) => return Err(SessionError::CritiqueInFlight),
            Some(InFlight::Evaluation { .. }) => return Err(SessionError::FinalizationPending),
            None => {}
        }

        let state = self.steps[idx].state;
        if state != StepState::Open {
            return Err(SessionError::InvalidState {
                step: id,
                expected: StepState::Open.to_string(),
                actual: state.to_string(),
            });
        }

        if self.steps[idx].is_blank() {
            debug!(step = %id, "ignoring blank submission");
            return Ok(Effect::Unchanged);
        }

        let ticket = self.issue_ticket();
        let challenge = self.challenge.clone().ok_or(SessionError::NotStarted)?;
        let step = &mut self.steps[idx];
        step.state = StepState::AwaitingCritique;
        self.in_flight = Some(InFlight::Critique { ticket, step: id });
        info!(step = %id, position = step.position, "step submitted");

        Ok(Effect::RequestCritique(CritiqueRequest {
            ticket,
            step: id,
            content: step.content.clone(),
            prior: self.steps[..idx].to_vec(),
            challenge,
        }))
    }

    /// Take the in-flight critique if `ticket` matches it.
    fn take_critique(&mut self, ticket: Ticket) -> Option<usize> {
        match self.in_flight {
            Some(InFlight::Critique { ticket: t, step }) if t == ticket => {
                self.in_flight = None;
                self.steps.iter().position(|s| s.id == step)
            }
            _ => None,
        }
    }

    fn critique_ready(&mut self, ticket: Ticket, critique: Critique) -> Effect {
        let Some(idx) = self.take_critique(ticket) else {
            debug!(?ticket, "discarding stale critique");
            return Effect::Discarded;
        };

        let step = &mut self.steps[idx];
        step.critique = Some(critique.text.clone());
        step.depth_score = Some(critique.depth_score);
        step.state = StepState::Critiqued;
        let id = step.id;
        let position = step.position;

        let next = Step::open(position + 1);
        let next_id = next.id;
        self.steps.push(next);
        info!(step = %id, position, depth_score = critique.depth_score, "step critiqued");

        Effect::StepCritiqued {
            step: id,
            critique,
            next: next_id,
        }
    }

    fn critique_unavailable(&mut self, ticket: Ticket, reason: String) -> Effect {
        let Some(idx) = self.take_critique(ticket) else {
            debug!(?ticket, "discarding stale critique failure");
            return Effect::Discarded;
        };

        let step = &mut self.steps[idx];
        step.state = StepState::Open;
        warn!(step = %step.id, reason = %reason, "critique unavailable, step reopened");
        Effect::StepReverted {
            step: step.id,
            reason,
        }
    }

    /// Move to finalizing and build the evaluation request.
    pub fn finish(&mut self) -> Result<EvaluationRequest, SessionError> {
        self.ensure_active()?;
        match self.in_flight {
            Some(InFlight::Critique { .. }) => return Err(SessionError::CritiqueInFlight),
            Some(InFlight::Evaluation { .. }) => return Err(SessionError::FinalizationPending),
            None => {}
        }

        let critiqued = self.critiqued_count();
        if critiqued < MIN_CRITIQUED_STEPS {
            return Err(SessionError::NotEvaluable {
                critiqued,
                required: MIN_CRITIQUED_STEPS,
            });
        }

        let challenge = self.challenge.clone().ok_or(SessionError::NotStarted)?;
        let ticket = self.issue_ticket();
        self.in_flight = Some(InFlight::Evaluation { ticket });
        let steps = graded_steps(&self.steps);
        info!(steps = steps.len(), "session submitted for evaluation");

        Ok(EvaluationRequest {
            ticket,
            steps,
            challenge,
        })
    }

    fn take_evaluation(&mut self, ticket: Ticket) -> bool {
        match self.in_flight {
            Some(InFlight::Evaluation { ticket: t }) if t == ticket => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    fn evaluation_ready(&mut self, ticket: Ticket, result: SessionResult) -> Effect {
        if !self.take_evaluation(ticket) {
            debug!(?ticket, "discarding stale evaluation");
            return Effect::Discarded;
        }
        info!(score = result.score, "session finalized");
        self.result = Some(result.clone());
        Effect::Finalized(result)
    }

    fn evaluation_failed(&mut self, ticket: Ticket, reason: String) -> Effect {
        if !self.take_evaluation(ticket) {
            debug!(?ticket, "discarding stale evaluation failure");
            return Effect::Discarded;
        }
        warn!(reason = %reason, "session evaluation failed");
        Effect::FinalizationAborted { reason }
    }
}
