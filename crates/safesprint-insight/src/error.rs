use safesprint_core::error::SafeSprintError;
use safesprint_llm::CompletionError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur on the leader side of a session.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("leader credential rejected")]
    Unauthorized,
    #[error("could not generate a unique access code")]
    AccessCodeExhausted,
    #[error("report not available yet: {completed} of {total} participants finished")]
    NotEligible { completed: usize, total: usize },
    #[error("no completed summaries to synthesize")]
    NoInput,
    #[error("report synthesis failed: {0}")]
    Synthesis(CompletionError),
    #[error("storage error: {0}")]
    Storage(#[from] SafeSprintError),
}

impl InsightError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        InsightError::Validation {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let e = InsightError::validation("context", "must be at least 20 characters");
        assert_eq!(e.to_string(), "invalid context: must be at least 20 characters");
    }

    #[test]
    fn test_error_display_not_eligible() {
        let e = InsightError::NotEligible { completed: 1, total: 3 };
        assert_eq!(
            e.to_string(),
            "report not available yet: 1 of 3 participants finished"
        );
    }

    #[test]
    fn test_error_from_storage() {
        let e: InsightError = SafeSprintError::Storage("locked".into()).into();
        assert_eq!(e.to_string(), "storage error: Storage error: locked");
    }
}
