//! SafeSprint Interview crate - per-participant conversation driver.
//!
//! Owns the interview state machine, the interviewer prompts, and the
//! engine that greets participants, relays their answers to the completion
//! service, and produces the anonymous individual summary on finalize.

pub mod engine;
pub mod error;
pub mod prompts;
pub mod state_machine;

#[cfg(test)]
mod proptests;

pub use engine::{FinalizeOutcome, InterviewEngine, Transcript, TurnOutcome};
pub use error::InterviewError;
pub use state_machine::{InterviewState, MIN_USER_TURNS};
