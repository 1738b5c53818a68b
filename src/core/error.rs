//! Custom error types for the council
//!
//! Provides a unified error handling system across all modules. Tool
//! failures are deliberately absent: the executor reports them as
//! [`ToolFailure`](crate::core::ToolFailure) values inside a result.

use thiserror::Error;

/// Main error type for council operations
#[derive(Error, Debug)]
pub enum CouncilError {
    /// Language-model service returned an error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Language-model service could not be reached at all
    #[error("Cannot reach the language-model service at {0}")]
    LlmUnreachable(String),

    /// Remote tool-server protocol errors
    #[error("Tool server protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Agent registry could not be loaded
    #[error("Agent registry error: {0}")]
    Registry(String),

    /// Required credentials are missing
    #[error("Missing credentials: set {0}")]
    MissingCredentials(String),

    /// The orchestration cycle was aborted by reset or exit
    #[error("Cycle cancelled")]
    Cancelled,

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for council operations
pub type Result<T> = std::result::Result<T, CouncilError>;

impl CouncilError {
    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Whether this error aborts the session before any turn begins
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials(_) | Self::Registry(_) | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_classification() {
        assert!(CouncilError::MissingCredentials("ANTHROPIC_API_KEY".into()).is_session_fatal());
        assert!(CouncilError::registry("empty").is_session_fatal());
        assert!(!CouncilError::llm("overloaded").is_session_fatal());
        assert!(!CouncilError::Cancelled.is_session_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = CouncilError::MissingCredentials("ANTHROPIC_API_KEY".into());
        assert_eq!(err.to_string(), "Missing credentials: set ANTHROPIC_API_KEY");
    }
}
