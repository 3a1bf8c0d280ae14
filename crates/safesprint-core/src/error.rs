use thiserror::Error;

/// Top-level error type for SafeSprint.
///
/// Subsystem crates define their own error types and implement
/// `From<SafeSprintError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SafeSprintError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SafeSprintError {
    fn from(err: toml::de::Error) -> Self {
        SafeSprintError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SafeSprintError {
    fn from(err: toml::ser::Error) -> Self {
        SafeSprintError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SafeSprintError {
    fn from(err: serde_json::Error) -> Self {
        SafeSprintError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for SafeSprint operations.
pub type Result<T> = std::result::Result<T, SafeSprintError>;
