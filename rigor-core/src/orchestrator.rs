//! Session orchestrator.
//!
//! Drives a [`Session`] through its external calls: the challenge listing
//! at start, one critique per submitted step and the final evaluation. The
//! session lock is never held across a call, so the in-flight state is
//! observable (and `restart` works) while the model is thinking. Each call
//! runs on a spawned task that applies its own result, so a caller that
//! stops waiting cannot leave a request in flight forever.

use std::sync::Arc;

use rigor_models::ClientFactory;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use crate::challenge::{ChallengeProvider, ChallengeSource};
use crate::config::RigorConfig;
use crate::critique::{Critic, CritiqueService};
use crate::error::SessionError;
use crate::evaluator::{Grader, SessionEvaluator};
use crate::events::{EVENT_CHANNEL_CAPACITY, SessionEvent};
use crate::session::{Effect, Event, Session, SessionSnapshot};
use crate::types::{Challenge, Critique, SessionResult, StepId};

/// What happened to a submitted step.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank content; nothing was sent.
    Ignored,
    /// The step was critiqued and `next` is the new open step.
    Critiqued {
        step: StepId,
        critique: Critique,
        next: StepId,
    },
    /// No critique could be requested; the step is open again.
    Reverted { step: StepId, reason: String },
    /// The session was restarted before the critique arrived.
    Superseded,
}

/// Owns a session and the services it calls.
pub struct Orchestrator {
    challenges: Arc<dyn ChallengeSource>,
    critic: Arc<dyn Critic>,
    grader: Arc<dyn Grader>,
    session: Arc<Mutex<Session>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Orchestrator {
    /// Create an orchestrator over explicit services.
    pub fn new(
        challenges: Arc<dyn ChallengeSource>,
        critic: Arc<dyn Critic>,
        grader: Arc<dyn Grader>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            challenges,
            critic,
            grader,
            session: Arc::new(Mutex::new(Session::new())),
            event_tx,
        }
    }

    /// Create an orchestrator with model-backed services tuned by `config`.
    pub fn from_config(config: &RigorConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let tuning = &config.session;
        let challenges = ChallengeProvider::new(Arc::clone(&factory))
            .with_deadline(tuning.challenge_timeout())
            .with_count(tuning.challenge_count);
        let critic = CritiqueService::new(Arc::clone(&factory))
            .with_deadline(tuning.critique_timeout())
            .with_context_window(tuning.context_window);
        let grader = SessionEvaluator::new(factory).with_deadline(tuning.evaluation_timeout());

        Self::new(Arc::new(challenges), Arc::new(critic), Arc::new(grader))
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Point-in-time copy of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Whether the session currently satisfies the finish precondition.
    pub async fn can_finish(&self) -> bool {
        self.session.lock().await.can_finish()
    }

    /// List challenges. Never empty.
    pub async fn list_challenges(&self) -> Vec<Challenge> {
        self.challenges.list_challenges().await
    }

    /// Start a session on `challenge`, returning the first step's id.
    pub async fn start_session(&self, challenge: Challenge) -> StepId {
        let challenge_id = challenge.id.clone();
        let first = self.session.lock().await.start(challenge);
        self.emit(SessionEvent::Started {
            challenge: challenge_id,
            first,
        });
        first
    }

    /// Replace the content of an open step.
    ///
    /// Editing a critiqued step is accepted and leaves it unchanged.
    pub async fn edit_step(
        &self,
        step: StepId,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        let effect = self.session.lock().await.apply(Event::Edit {
            step,
            text: text.into(),
        })?;
        if let Effect::Edited { step } = effect {
            self.emit(SessionEvent::StepEdited { step });
        }
        Ok(())
    }

    /// Submit a step and wait for its critique.
    ///
    /// The critique runs on its own task and settles the step even if the
    /// returned future is dropped.
    pub async fn submit_step(&self, step: StepId) -> Result<SubmitOutcome, SessionError> {
        let request = match self.session.lock().await.apply(Event::Submit { step })? {
            Effect::RequestCritique(request) => request,
            _ => return Ok(SubmitOutcome::Ignored),
        };

        let ticket = request.ticket;
        let position = request.prior.len() as u32 + 1;
        self.emit(SessionEvent::CritiqueRequested { step, position });

        let critic = Arc::clone(&self.critic);
        let session = Arc::clone(&self.session);
        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            let event = match critic
                .critique(&request.content, &request.prior, &request.challenge)
                .await
            {
                Ok(critique) => Event::CritiqueReady { ticket, critique },
                Err(e) => Event::CritiqueUnavailable {
                    ticket,
                    reason: e.to_string(),
                },
            };
            let effect = session.lock().await.apply(event)?;
            Ok::<_, SessionError>(settle_critique(&event_tx, step, effect))
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(step = %step, error = %e, "critique task died");
                let effect = self.session.lock().await.apply(Event::CritiqueUnavailable {
                    ticket,
                    reason: "critique task died".to_string(),
                })?;
                Ok(settle_critique(&self.event_tx, step, effect))
            }
        }
    }

    /// Evaluate the session and finalize it.
    ///
    /// A grader failure leaves the session unfinalized so this can be
    /// called again. Like [`submit_step`](Self::submit_step), the grading
    /// settles even if the returned future is dropped.
    pub async fn finish_session(&self) -> Result<SessionResult, SessionError> {
        let request = self.session.lock().await.finish()?;
        let ticket = request.ticket;

        self.emit(SessionEvent::EvaluationRequested {
            steps: request.steps.len(),
        });

        let grader = Arc::clone(&self.grader);
        let session = Arc::clone(&self.session);
        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            let event = match grader.evaluate(&request.steps, &request.challenge).await {
                Ok(result) => Event::EvaluationReady { ticket, result },
                Err(e) => {
                    warn!(error = %e, "grader failed outside its deadline guard");
                    Event::EvaluationFailed {
                        ticket,
                        reason: e.to_string(),
                    }
                }
            };
            let effect = session.lock().await.apply(event)?;
            settle_evaluation(&event_tx, effect)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "evaluation task died");
                let effect = self.session.lock().await.apply(Event::EvaluationFailed {
                    ticket,
                    reason: "evaluation task died".to_string(),
                })?;
                settle_evaluation(&self.event_tx, effect)
            }
        }
    }

    /// Clear challenge, steps and result.
    pub async fn restart(&self) {
        if let Ok(Effect::Cleared) = self.session.lock().await.apply(Event::Restart) {
            self.emit(SessionEvent::Cleared);
        }
    }

    fn emit(&self, event: SessionEvent) {
        publish(&self.event_tx, event);
    }
}

fn publish(event_tx: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    // No subscribers is fine.
    let _ = event_tx.send(event);
}

fn settle_critique(
    event_tx: &broadcast::Sender<SessionEvent>,
    step: StepId,
    effect: Effect,
) -> SubmitOutcome {
    match effect {
        Effect::StepCritiqued {
            step,
            critique,
            next,
        } => {
            publish(
                event_tx,
                SessionEvent::StepCritiqued {
                    step,
                    critique: critique.clone(),
                    next,
                },
            );
            SubmitOutcome::Critiqued {
                step,
                critique,
                next,
            }
        }
        Effect::StepReverted { step, reason } => {
            publish(
                event_tx,
                SessionEvent::StepReverted {
                    step,
                    reason: reason.clone(),
                },
            );
            SubmitOutcome::Reverted { step, reason }
        }
        _ => {
            debug!(step = %step, "critique arrived for a superseded session");
            SubmitOutcome::Superseded
        }
    }
}

fn settle_evaluation(
    event_tx: &broadcast::Sender<SessionEvent>,
    effect: Effect,
) -> Result<SessionResult, SessionError> {
    match effect {
        Effect::Finalized(result) => {
            publish(
                event_tx,
                SessionEvent::Finalized {
                    result: result.clone(),
                },
            );
            Ok(result)
        }
        Effect::FinalizationAborted { reason } => {
            publish(event_tx, SessionEvent::FinalizationFailed { reason: reason.clone() });
            Err(SessionError::EvaluationFailed(reason))
        }
        _ => Err(SessionError::Superseded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use tokio::sync::Notify;

    use crate::challenge::fallback_catalog;
    use crate::error::{CritiqueError, Error};
    use crate::evaluator::graded_steps;
    use crate::types::{Step, StepState};

    struct StaticChallenges;

    #[async_trait]
    impl ChallengeSource for StaticChallenges {
        async fn list_challenges(&self) -> Vec<Challenge> {
            fallback_catalog()
        }
    }

    struct FixedCritic(Critique);

    #[async_trait]
    impl Critic for FixedCritic {
        async fn critique(
            &self,
            _current: &str,
            _prior: &[Step],
            _challenge: &Challenge,
        ) -> Result<Critique, CritiqueError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenCritic;

    #[async_trait]
    impl Critic for BrokenCritic {
        async fn critique(
            &self,
            _current: &str,
            _prior: &[Step],
            _challenge: &Challenge,
        ) -> Result<Critique, CritiqueError> {
            Err(CritiqueError::Client(
                rigor_models::Error::CredentialsNotFound("gemini".to_string()),
            ))
        }
    }

    /// Holds every critique until released.
    struct GatedCritic {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Critic for GatedCritic {
        async fn critique(
            &self,
            _current: &str,
            _prior: &[Step],
            _challenge: &Challenge,
        ) -> Result<Critique, CritiqueError> {
            self.gate.notified().await;
            Ok(Critique::new("late", 9))
        }
    }

    /// Answers after a fixed delay.
    struct SlowCritic(Duration);

    #[async_trait]
    impl Critic for SlowCritic {
        async fn critique(
            &self,
            _current: &str,
            _prior: &[Step],
            _challenge: &Challenge,
        ) -> Result<Critique, CritiqueError> {
            tokio::time::sleep(self.0).await;
            Ok(Critique::new("slow but sure", 6))
        }
    }

    struct SlowGrader(Duration);

    #[async_trait]
    impl Grader for SlowGrader {
        async fn evaluate(
            &self,
            _steps: &[Step],
            _challenge: &Challenge,
        ) -> crate::Result<SessionResult> {
            tokio::time::sleep(self.0).await;
            Ok(result())
        }
    }

    struct FixedGrader(SessionResult);

    #[async_trait]
    impl Grader for FixedGrader {
        async fn evaluate(
            &self,
            steps: &[Step],
            _challenge: &Challenge,
        ) -> crate::Result<SessionResult> {
            assert_eq!(steps, graded_steps(steps).as_slice());
            Ok(self.0.clone())
        }
    }

    struct FailingGrader;

    #[async_trait]
    impl Grader for FailingGrader {
        async fn evaluate(
            &self,
            _steps: &[Step],
            _challenge: &Challenge,
        ) -> crate::Result<SessionResult> {
            Err(Error::MalformedResponse("grader crashed".to_string()))
        }
    }

    fn result() -> SessionResult {
        SessionResult {
            score: 64,
            summary: "Reasonable".to_string(),
            strengths: vec!["sharding".to_string()],
            weaknesses: vec!["no failure modes".to_string()],
        }
    }

    fn orchestrator(critic: impl Critic + 'static, grader: impl Grader + 'static) -> Orchestrator {
        Orchestrator::new(Arc::new(StaticChallenges), Arc::new(critic), Arc::new(grader))
    }

    async fn answer(orch: &Orchestrator, step: StepId, text: &str) -> SubmitOutcome {
        orch.edit_step(step, text).await.unwrap();
        orch.submit_step(step).await.unwrap()
    }

    #[tokio::test]
    async fn submit_critiques_and_appends_next_step() {
        let orch = orchestrator(
            FixedCritic(Critique::new("Why hash ring over range sharding?", 7)),
            FixedGrader(result()),
        );
        let challenge = orch.list_challenges().await.remove(0);
        let first = orch.start_session(challenge).await;

        let outcome = answer(&orch, first, "use a hash ring for sharding").await;
        let SubmitOutcome::Critiqued { step, critique, next } = outcome else {
            panic!("expected Critiqued, got {outcome:?}");
        };
        assert_eq!(step, first);
        assert_eq!(critique, Critique::new("Why hash ring over range sharding?", 7));

        let snapshot = orch.snapshot().await;
        assert_eq!(snapshot.steps.len(), 2);
        assert_eq!(snapshot.steps[1].id, next);
        assert_eq!(snapshot.steps[1].position, 2);
        assert_eq!(snapshot.steps[1].state, StepState::Open);
    }

    #[tokio::test]
    async fn blank_submit_is_ignored() {
        let orch = orchestrator(FixedCritic(Critique::fallback()), FixedGrader(result()));
        let first = orch.start_session(fallback_catalog().remove(0)).await;

        assert_eq!(answer(&orch, first, "   ").await, SubmitOutcome::Ignored);
        assert_eq!(orch.snapshot().await.steps.len(), 1);
    }

    #[tokio::test]
    async fn construction_failure_reverts_step() {
        let orch = orchestrator(BrokenCritic, FixedGrader(result()));
        let mut events = orch.subscribe();
        let first = orch.start_session(fallback_catalog().remove(0)).await;

        let outcome = answer(&orch, first, "cache in redis").await;
        assert!(matches!(outcome, SubmitOutcome::Reverted { step, .. } if step == first));

        let snapshot = orch.snapshot().await;
        assert_eq!(snapshot.steps.len(), 1);
        assert_eq!(snapshot.steps[0].state, StepState::Open);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.last(), Some(SessionEvent::StepReverted { .. })));
    }

    #[tokio::test]
    async fn finish_requires_two_critiqued_steps() {
        let orch = orchestrator(FixedCritic(Critique::new("q", 6)), FixedGrader(result()));
        let first = orch.start_session(fallback_catalog().remove(0)).await;

        let SubmitOutcome::Critiqued { next, .. } = answer(&orch, first, "a").await else {
            panic!("expected Critiqued");
        };
        assert!(matches!(
            orch.finish_session().await,
            Err(SessionError::NotEvaluable { critiqued: 1, .. })
        ));

        answer(&orch, next, "b").await;
        assert!(orch.can_finish().await);
        assert_eq!(orch.finish_session().await.unwrap(), result());
        assert_eq!(orch.snapshot().await.result, Some(result()));
        assert_eq!(orch.finish_session().await, Err(SessionError::Finalized));
    }

    #[tokio::test]
    async fn grader_failure_is_retryable() {
        let orch = orchestrator(FixedCritic(Critique::new("q", 6)), FailingGrader);
        let first = orch.start_session(fallback_catalog().remove(0)).await;
        let SubmitOutcome::Critiqued { next, .. } = answer(&orch, first, "a").await else {
            panic!("expected Critiqued");
        };
        answer(&orch, next, "b").await;

        let err = orch.finish_session().await.unwrap_err();
        assert!(matches!(err, SessionError::EvaluationFailed(_)));

        let snapshot = orch.snapshot().await;
        assert!(snapshot.result.is_none());
        assert!(!snapshot.finalizing);
        assert!(orch.can_finish().await);
    }

    #[tokio::test]
    async fn restart_during_critique_supersedes_it() {
        let gate = Arc::new(Notify::new());
        let orch = Arc::new(orchestrator(
            GatedCritic {
                gate: Arc::clone(&gate),
            },
            FixedGrader(result()),
        ));
        let mut events = orch.subscribe();
        let first = orch.start_session(fallback_catalog().remove(0)).await;
        orch.edit_step(first, "slow thought").await.unwrap();

        let pending = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.submit_step(first).await }
        });

        loop {
            if let SessionEvent::CritiqueRequested { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        assert_eq!(
            orch.snapshot().await.steps[0].state,
            StepState::AwaitingCritique
        );

        orch.restart().await;
        gate.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), SubmitOutcome::Superseded);
        let snapshot = orch.snapshot().await;
        assert!(snapshot.challenge.is_none());
        assert!(snapshot.steps.is_empty());
    }

    #[tokio::test]
    async fn events_follow_the_session_lifecycle() {
        let orch = orchestrator(FixedCritic(Critique::new("q", 4)), FixedGrader(result()));
        let mut events = orch.subscribe();

        let first = orch.start_session(fallback_catalog().remove(0)).await;
        let SubmitOutcome::Critiqued { next, .. } = answer(&orch, first, "a").await else {
            panic!("expected Critiqued");
        };
        answer(&orch, next, "b").await;
        orch.finish_session().await.unwrap();
        orch.restart().await;

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(serde_json::to_value(&event).unwrap()["type"].clone());
        }
        let kinds: Vec<&str> = kinds.iter().filter_map(|k| k.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "started",
                "step_edited",
                "critique_requested",
                "step_critiqued",
                "step_edited",
                "critique_requested",
                "step_critiqued",
                "evaluation_requested",
                "finalized",
                "cleared",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_submit_still_settles_the_step() {
        let orch = orchestrator(SlowCritic(Duration::from_secs(10)), FixedGrader(result()));
        let first = orch.start_session(fallback_catalog().remove(0)).await;
        orch.edit_step(first, "write-through cache").await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), orch.submit_step(first)).await;
        assert!(abandoned.is_err());
        assert_eq!(
            orch.snapshot().await.steps[0].state,
            StepState::AwaitingCritique
        );

        tokio::time::sleep(Duration::from_secs(60)).await;

        let snapshot = orch.snapshot().await;
        assert_eq!(snapshot.steps[0].state, StepState::Critiqued);
        assert_eq!(snapshot.steps[0].critique.as_deref(), Some("slow but sure"));
        assert_eq!(snapshot.steps.len(), 2);

        let next = snapshot.steps[1].id;
        orch.edit_step(next, "invalidate on write").await.unwrap();
        assert!(matches!(
            orch.submit_step(next).await.unwrap(),
            SubmitOutcome::Critiqued { step, .. } if step == next
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_finish_still_finalizes() {
        let orch = orchestrator(
            FixedCritic(Critique::new("q", 6)),
            SlowGrader(Duration::from_secs(5)),
        );
        let first = orch.start_session(fallback_catalog().remove(0)).await;
        let SubmitOutcome::Critiqued { next, .. } = answer(&orch, first, "a").await else {
            panic!("expected Critiqued");
        };
        answer(&orch, next, "b").await;

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), orch.finish_session()).await;
        assert!(abandoned.is_err());
        assert!(orch.snapshot().await.finalizing);

        tokio::time::sleep(Duration::from_secs(30)).await;

        let snapshot = orch.snapshot().await;
        assert!(!snapshot.finalizing);
        assert_eq!(snapshot.result, Some(result()));
        assert_eq!(orch.finish_session().await, Err(SessionError::Finalized));
    }
}
