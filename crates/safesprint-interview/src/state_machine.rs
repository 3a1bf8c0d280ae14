//! Interview state machine with validated transitions.
//!
//! Per participant:
//! Uninitiated -> Active -> Submittable -> Completing -> Completed
//! Completing -> Submittable when summarization fails.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InterviewError;

/// User turns required before an interview may be finalized.
pub const MIN_USER_TURNS: usize = 3;

/// Lifecycle state of one participant's interview.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewState {
    /// No messages yet.
    Uninitiated,
    /// Greeted, fewer than [`MIN_USER_TURNS`] answers.
    Active,
    /// Enough answers to finalize.
    Submittable,
    /// Summary being generated. Never persisted.
    Completing,
    /// Summary stored. Terminal.
    Completed,
}

impl InterviewState {
    /// Derive the persisted state from a participant's stored data.
    pub fn derive(has_completed: bool, message_count: usize, user_turns: usize) -> Self {
        if has_completed {
            InterviewState::Completed
        } else if message_count == 0 {
            InterviewState::Uninitiated
        } else if user_turns >= MIN_USER_TURNS {
            InterviewState::Submittable
        } else {
            InterviewState::Active
        }
    }

    /// State reached after one more user turn.
    pub fn after_turn(user_turns_after: usize) -> Self {
        if user_turns_after >= MIN_USER_TURNS {
            InterviewState::Submittable
        } else {
            InterviewState::Active
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InterviewState::Completed)
    }
}

impl fmt::Display for InterviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterviewState::Uninitiated => "uninitiated",
            InterviewState::Active => "active",
            InterviewState::Submittable => "submittable",
            InterviewState::Completing => "completing",
            InterviewState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Validate that an interview transition is allowed.
///
/// Valid transitions:
/// - Uninitiated -> Active (greeting)
/// - Active -> Active (turn below threshold)
/// - Active -> Submittable (threshold reached)
/// - Submittable -> Submittable (further turns)
/// - Submittable -> Completing (finalize)
/// - Completing -> Completed (summary stored)
/// - Completing -> Submittable (summary failed)
pub fn validate_transition(from: InterviewState, to: InterviewState) -> Result<(), InterviewError> {
    use InterviewState::*;

    let valid = matches!(
        (from, to),
        (Uninitiated, Active)
            | (Active, Active)
            | (Active, Submittable)
            | (Submittable, Submittable)
            | (Submittable, Completing)
            | (Completing, Completed)
            | (Completing, Submittable)
    );

    if valid {
        Ok(())
    } else {
        Err(InterviewError::InvalidTransition(from, to))
    }
}
