//! Interview engine.
//!
//! Drives one participant's conversation turn by turn: greets on first
//! entry, relays each answer to the completion service with the prior
//! history, and turns the finished transcript into an anonymous summary.
//! Operations on the same participant are serialized through a per-participant
//! async gate; completion itself is a conditional write in the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use safesprint_core::config::InterviewConfig;
use safesprint_core::types::{AccessCode, Message, MessageRole, Participant, Session};
use safesprint_llm::{CompletionError, CompletionService};
use safesprint_storage::{Database, MessageRepository, ParticipantRepository, SessionRepository};

use crate::error::InterviewError;
use crate::prompts;
use crate::state_machine::{validate_transition, InterviewState, MIN_USER_TURNS};

/// Everything a participant's chat view needs.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub participant_id: Uuid,
    pub session_id: Uuid,
    pub session_name: String,
    pub role_label: String,
    pub context: String,
    pub state: InterviewState,
    pub user_turns: usize,
    pub required_turns: usize,
    pub messages: Vec<Message>,
}

/// Result of one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub user_message: Message,
    pub ai_message: Message,
    /// The AI slot holds a placeholder instead of a generated reply.
    pub degraded: bool,
    pub state: InterviewState,
    pub user_turns: usize,
}

/// Result of a finalize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// This call stored the summary.
    Completed { summary: String },
    /// The participant was already completed; nothing was written.
    AlreadyCompleted,
}

/// Per-participant interview driver.
pub struct InterviewEngine<C: CompletionService> {
    sessions: SessionRepository,
    participants: ParticipantRepository,
    messages: MessageRepository,
    completion: Arc<C>,
    config: InterviewConfig,
    gates: GateMap,
}

impl<C: CompletionService> InterviewEngine<C> {
    pub fn new(db: Arc<Database>, completion: Arc<C>, config: InterviewConfig) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&db)),
            participants: ParticipantRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(db),
            completion,
            config,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve an access code to its participant.
    ///
    /// Input is trimmed and upper-cased, then matched exactly.
    pub fn login(&self, access_code: &str) -> Result<Participant, InterviewError> {
        let code = AccessCode::normalize(access_code);
        if code.as_str().is_empty() {
            return Err(InterviewError::InvalidAccessCode);
        }
        let participant = self
            .participants
            .find_by_access_code(&code)?
            .ok_or(InterviewError::InvalidAccessCode)?;

        info!(
            participant_id = %participant.id,
            session_id = %participant.session_id,
            "Participant logged in"
        );
        Ok(participant)
    }

    /// Enter the interview, greeting the participant if nothing was said yet.
    ///
    /// Idempotent: re-entry never adds a second greeting, and a completed
    /// interview is returned as-is.
    pub async fn open(&self, participant_id: Uuid) -> Result<Transcript, InterviewError> {
        let _gate = self.lock_gate(participant_id).await;

        let (participant, session) = self.load(participant_id)?;
        let mut messages = self.messages.list_by_participant(participant.id)?;
        if messages.is_empty() && !participant.has_completed {
            messages.push(self.greet(&participant, &session)?);
        }
        Ok(self.assemble(participant, session, messages))
    }

    /// Current transcript without side effects.
    pub fn transcript(&self, participant_id: Uuid) -> Result<Transcript, InterviewError> {
        let (participant, session) = self.load(participant_id)?;
        let messages = self.messages.list_by_participant(participant.id)?;
        Ok(self.assemble(participant, session, messages))
    }

    /// Record one participant answer and the interviewer's reply.
    ///
    /// A completion failure does not fail the turn: the user message stays
    /// and the AI slot records a placeholder describing the failure.
    pub async fn send_turn(
        &self,
        participant_id: Uuid,
        text: &str,
    ) -> Result<TurnOutcome, InterviewError> {
        let text = self.validate_text(text)?;
        let _gate = self.try_gate(participant_id)?;

        let (participant, session) = self.load(participant_id)?;
        if participant.has_completed {
            return Err(InterviewError::AlreadyCompleted);
        }

        let mut history = self.messages.list_by_participant(participant.id)?;
        if history.is_empty() {
            history.push(self.greet(&participant, &session)?);
        }

        let user_turns_before = prompts::user_turns(&history);
        let current = InterviewState::derive(false, history.len(), user_turns_before);
        let next = InterviewState::after_turn(user_turns_before + 1);
        validate_transition(current, next)?;

        let user_message = self.messages.append(&participant, MessageRole::User, text)?;

        let framing = prompts::interview_framing(&participant.role_label, &session.context);
        let turns = prompts::build_history(&history);
        let reply = match self.completion.complete(&turns, text, &framing).await {
            Ok(reply) if reply.trim().is_empty() => Err(CompletionError::EmptyResponse),
            other => other,
        };
        let (reply, degraded) = match reply {
            Ok(reply) => (reply, false),
            Err(e) => {
                warn!(
                    participant_id = %participant.id,
                    error = %e,
                    "Completion failed during turn; storing placeholder"
                );
                (prompts::failure_placeholder(&e), true)
            }
        };

        let ai_message = self.messages.append(&participant, MessageRole::Ai, &reply)?;

        debug!(
            participant_id = %participant.id,
            user_turns = user_turns_before + 1,
            degraded,
            "Turn recorded"
        );

        Ok(TurnOutcome {
            user_message,
            ai_message,
            degraded,
            state: next,
            user_turns: user_turns_before + 1,
        })
    }

    /// Summarize the interview and mark the participant completed.
    ///
    /// Waits for any running turn. A participant that is already completed
    /// yields [`FinalizeOutcome::AlreadyCompleted`] without calling the
    /// completion service. Summarization failures leave the participant
    /// untouched.
    pub async fn finalize(&self, participant_id: Uuid) -> Result<FinalizeOutcome, InterviewError> {
        let _gate = self.lock_gate(participant_id).await;

        let participant = self
            .participants
            .find_by_id(participant_id)?
            .ok_or(InterviewError::ParticipantNotFound(participant_id))?;
        if participant.has_completed {
            debug!(participant_id = %participant.id, "Finalize on completed participant is a no-op");
            return Ok(FinalizeOutcome::AlreadyCompleted);
        }

        let messages = self.messages.list_by_participant(participant.id)?;
        let user_turns = prompts::user_turns(&messages);
        if user_turns < MIN_USER_TURNS {
            return Err(InterviewError::NotEnoughTurns {
                remaining: MIN_USER_TURNS - user_turns,
            });
        }
        validate_transition(InterviewState::Submittable, InterviewState::Completing)?;

        let prompt = prompts::summary_prompt(&messages);
        let summary = match self.completion.complete(&[], &prompt, "").await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => return Err(self.abort_finalize(&participant, CompletionError::EmptyResponse)),
            Err(e) => return Err(self.abort_finalize(&participant, e)),
        };
        validate_transition(InterviewState::Completing, InterviewState::Completed)?;

        if self.participants.complete(&participant, &summary)? {
            info!(
                participant_id = %participant.id,
                session_id = %participant.session_id,
                user_turns,
                "Interview completed"
            );
            Ok(FinalizeOutcome::Completed { summary })
        } else {
            debug!(participant_id = %participant.id, "Completed concurrently elsewhere");
            Ok(FinalizeOutcome::AlreadyCompleted)
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn abort_finalize(&self, participant: &Participant, error: CompletionError) -> InterviewError {
        warn!(
            participant_id = %participant.id,
            error = %error,
            "Summary generation failed; interview stays open"
        );
        InterviewError::Summarization(error)
    }

    fn validate_text<'a>(&self, text: &'a str) -> Result<&'a str, InterviewError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InterviewError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > self.config.max_message_chars {
            return Err(InterviewError::MessageTooLong {
                len,
                max: self.config.max_message_chars,
            });
        }
        Ok(text)
    }

    fn load(&self, participant_id: Uuid) -> Result<(Participant, Session), InterviewError> {
        let participant = self
            .participants
            .find_by_id(participant_id)?
            .ok_or(InterviewError::ParticipantNotFound(participant_id))?;
        let session = self
            .sessions
            .find_by_id(participant.session_id)?
            .ok_or(InterviewError::SessionNotFound(participant.session_id))?;
        Ok((participant, session))
    }

    fn greet(&self, participant: &Participant, session: &Session) -> Result<Message, InterviewError> {
        validate_transition(InterviewState::Uninitiated, InterviewState::Active)?;
        let text = prompts::greeting(&participant.role_label, &session.context);
        let message = self.messages.append(participant, MessageRole::Ai, &text)?;
        info!(participant_id = %participant.id, "Interview opened");
        Ok(message)
    }

    fn assemble(&self, participant: Participant, session: Session, messages: Vec<Message>) -> Transcript {
        let user_turns = prompts::user_turns(&messages);
        let state = InterviewState::derive(participant.has_completed, messages.len(), user_turns);
        Transcript {
            participant_id: participant.id,
            session_id: session.id,
            session_name: session.name,
            role_label: participant.role_label,
            context: session.context,
            state,
            user_turns,
            required_turns: MIN_USER_TURNS,
            messages,
        }
    }

    fn gate(&self, participant_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut gates = lock_gates(&self.gates);
        Arc::clone(gates.entry(participant_id).or_default())
    }

    async fn lock_gate(&self, participant_id: Uuid) -> GateGuard<'_> {
        let guard = self.gate(participant_id).lock_owned().await;
        GateGuard::new(&self.gates, participant_id, guard)
    }

    fn try_gate(&self, participant_id: Uuid) -> Result<GateGuard<'_>, InterviewError> {
        let guard = self
            .gate(participant_id)
            .try_lock_owned()
            .map_err(|_| InterviewError::TurnInProgress(participant_id))?;
        Ok(GateGuard::new(&self.gates, participant_id, guard))
    }
}

type GateMap = Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>;

fn lock_gates(gates: &GateMap) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<AsyncMutex<()>>>> {
    match gates.lock() {
        Ok(gates) => gates,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Held for the duration of one participant operation.
///
/// On release the map entry is removed unless another task still holds or
/// waits on the same gate, so the map only tracks participants in flight.
struct GateGuard<'a> {
    gates: &'a GateMap,
    participant_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> GateGuard<'a> {
    fn new(gates: &'a GateMap, participant_id: Uuid, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            gates,
            participant_id,
            guard: Some(guard),
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut gates = lock_gates(self.gates);
        if gates
            .get(&self.participant_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.participant_id);
        }
    }
}
