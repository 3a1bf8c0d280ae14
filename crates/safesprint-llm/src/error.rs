use thiserror::Error;

/// Failure modes of a completion call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// No API key was configured for the backend.
    #[error("Configuration Error: API Key missing.")]
    MissingApiKey,

    /// The backend answered with an error status or error body.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered successfully but with no text.
    #[error("Empty response from completion service")]
    EmptyResponse,

    /// The response body could not be interpreted.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Empty output is a soft failure: interview turns swap in a placeholder.
    pub fn is_empty_response(&self) -> bool {
        matches!(self, CompletionError::EmptyResponse)
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            CompletionError::MissingApiKey.to_string(),
            "Configuration Error: API Key missing."
        );
        let err = CompletionError::Service {
            status: 429,
            message: "Resource has been exhausted".into(),
        };
        assert_eq!(err.to_string(), "Resource has been exhausted");
    }

    #[test]
    fn test_soft_failure() {
        assert!(CompletionError::EmptyResponse.is_empty_response());
        assert!(!CompletionError::Transport("timeout".into()).is_empty_response());
    }
}
