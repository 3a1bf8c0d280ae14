//! Scripted completion service for tests and offline development.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::{CompletionError, CompletionService, Turn};

/// A call observed by [`MockCompletionService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prior_turns: Vec<Turn>,
    pub new_input: String,
    pub framing: String,
}

/// Mock completion service.
///
/// Replies are taken from a scripted queue; once it is drained every call
/// echoes a short acknowledgement of the input. All calls are recorded.
#[derive(Debug, Default)]
pub struct MockCompletionService {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
    delay: Option<Duration>,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.push(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: CompletionError) {
        self.push(Err(error));
    }

    fn push(&self, outcome: Result<String, CompletionError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().ok().and_then(|c| c.last().cloned())
    }
}

impl CompletionService for MockCompletionService {
    async fn complete(
        &self,
        prior_turns: &[Turn],
        new_input: &str,
        framing: &str,
    ) -> Result<String, CompletionError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                prior_turns: prior_turns.to_vec(),
                new_input: new_input.to_string(),
                framing: framing.to_string(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());

        tracing::debug!(
            history = prior_turns.len(),
            scripted = scripted.is_some(),
            "Mock completion generated"
        );

        match scripted {
            Some(outcome) => outcome,
            None => Ok(format!("[mock reply to {} chars]", new_input.chars().count())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safesprint_core::types::MessageRole;

    #[tokio::test]
    async fn test_scripted_then_default() {
        let mock = MockCompletionService::new();
        mock.push_reply("first");
        mock.push_error(CompletionError::EmptyResponse);

        assert_eq!(mock.complete(&[], "a", "").await.unwrap(), "first");
        assert_eq!(
            mock.complete(&[], "b", "").await.unwrap_err(),
            CompletionError::EmptyResponse
        );
        assert_eq!(
            mock.complete(&[], "abc", "").await.unwrap(),
            "[mock reply to 3 chars]"
        );
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_records_calls() {
        let mock = MockCompletionService::new();
        let history = vec![Turn::new(MessageRole::Ai, "hello")];
        mock.complete(&history, "input", "framing").await.unwrap();

        let call = mock.last_call().unwrap();
        assert_eq!(call.prior_turns, history);
        assert_eq!(call.new_input, "input");
        assert_eq!(call.framing, "framing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let mock = MockCompletionService::new().with_delay(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        mock.complete(&[], "x", "").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
