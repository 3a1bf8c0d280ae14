//! Prompt text and history shaping for the interviewer.

use safesprint_core::types::{Message, MessageRole};
use safesprint_llm::{CompletionError, Turn};

/// Stored in place of an AI reply that came back empty.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "I'm listening...";

/// Opening message persisted when a participant first enters.
pub fn greeting(role_label: &str, context: &str) -> String {
    format!(
        "Hi! You are logged in as **{}**.\n\n\
         The goal of this retro is to discuss: *\"{}\"*.\n\n\
         How did this sprint feel for you? Be honest, your answers are anonymous.",
        role_label, context
    )
}

/// Fixed framing sent with every interview turn.
pub fn interview_framing(role_label: &str, context: &str) -> String {
    format!(
        "You are an Agile Coach interviewing a {} about: \"{}\". \
         Validate feelings, ask root cause questions. Keep it short.",
        role_label, context
    )
}

/// Summarization request over a full transcript.
pub fn summary_prompt(messages: &[Message]) -> String {
    let transcript = messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Summarize the key friction points from this chat as an anonymous bulleted list. \
         Do not include names or identifying details.\n\n{}",
        transcript
    )
}

/// Visible AI message recorded when a turn's completion call fails.
pub fn failure_placeholder(error: &CompletionError) -> String {
    match error {
        CompletionError::EmptyResponse => EMPTY_REPLY_PLACEHOLDER.to_string(),
        CompletionError::MissingApiKey => error.to_string(),
        other => format!("Error: {}", other),
    }
}

/// Map stored messages to completion history, preserving order.
pub fn build_history(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| Turn::new(m.role, m.content.clone()))
        .collect()
}

/// Count participant-authored messages.
pub fn user_turns(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.role == MessageRole::User).count()
}
