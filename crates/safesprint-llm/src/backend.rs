//! Runtime selection between the real client and the mock.

use std::sync::Arc;

use crate::{CompletionError, CompletionService, GeminiClient, MockCompletionService, Turn};

/// Completion backend chosen at startup.
///
/// Lets the server hold one concrete service type whether it talks to
/// Gemini or runs against the scripted mock.
#[derive(Debug, Clone)]
pub enum CompletionBackend {
    Gemini(GeminiClient),
    Mock(Arc<MockCompletionService>),
}

impl CompletionService for CompletionBackend {
    async fn complete(
        &self,
        prior_turns: &[Turn],
        new_input: &str,
        framing: &str,
    ) -> Result<String, CompletionError> {
        match self {
            CompletionBackend::Gemini(client) => client.complete(prior_turns, new_input, framing).await,
            CompletionBackend::Mock(mock) => mock.complete(prior_turns, new_input, framing).await,
        }
    }
}
