//! Error types for the interview engine.

use safesprint_core::error::SafeSprintError;
use safesprint_llm::CompletionError;
use uuid::Uuid;

use crate::state_machine::InterviewState;

/// Errors from driving a participant interview.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error("Invalid access code")]
    InvalidAccessCode,
    #[error("Participant not found: {0}")]
    ParticipantNotFound(Uuid),
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("Message is {len} characters, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("A turn is already in progress for participant {0}")]
    TurnInProgress(Uuid),
    #[error("Not enough answers yet: {remaining} more needed")]
    NotEnoughTurns { remaining: usize },
    #[error("Interview already completed")]
    AlreadyCompleted,
    #[error("Invalid interview transition: {0} -> {1}")]
    InvalidTransition(InterviewState, InterviewState),
    #[error("Summary generation failed: {0}")]
    Summarization(CompletionError),
    #[error("Storage error: {0}")]
    Storage(#[from] SafeSprintError),
}
