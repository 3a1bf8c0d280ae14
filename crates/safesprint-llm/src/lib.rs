//! SafeSprint LLM crate - stateless text completion.
//!
//! Provides a trait-based abstraction over a generative text backend, a
//! production client for the Gemini `generateContent` REST endpoint, and a
//! scripted mock for tests and offline development.

use std::future::Future;

use safesprint_core::types::MessageRole;

pub mod backend;
pub mod error;
pub mod gemini;
pub mod mock;

pub use backend::CompletionBackend;
pub use error::CompletionError;
pub use gemini::GeminiClient;
pub use mock::{MockCompletionService, RecordedCall};

// =============================================================================
// Types
// =============================================================================

/// One prior exchange fed back to the completion backend as history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: MessageRole,
    pub text: String,
}

impl Turn {
    pub fn new(speaker: MessageRole, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Single-shot prompt to text generation.
///
/// Implementations keep no state between calls; everything the backend needs
/// is passed in. Calls may be retried by callers, so a request can reach the
/// backend more than once.
pub trait CompletionService: Send + Sync {
    /// Generate a reply.
    ///
    /// # Arguments
    /// * `prior_turns` - Conversation history in canonical order, oldest first.
    /// * `new_input` - The text to respond to.
    /// * `framing` - Fixed instructions for the backend. May be empty.
    fn complete(
        &self,
        prior_turns: &[Turn],
        new_input: &str,
        framing: &str,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;
}
