//! Error types for genai-magics.

use thiserror::Error;

/// Result type alias using genai-magics' Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can surface from a session operation.
///
/// Formatting failures while describing a variable never appear here; the
/// inspector drops the affected detail line instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Generated code raised while running
    #[error("Execution error: {error_type}: {message}")]
    Execution {
        error_type: String,
        message: String,
        traceback: Option<String>,
    },

    /// Subprocess communication error
    #[error("Subprocess communication error: {0}")]
    SubprocessComm(String),

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// LLM API error
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// Tokenizer could not be loaded
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A namespace variable was missing or had the wrong shape
    #[error("Variable error: {0}")]
    Variable(String),

    /// Command line did not name a known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Known command with missing or malformed arguments
    #[error("Usage: {0}")]
    Usage(String),
}

impl Error {
    /// Create an execution error from the raised exception.
    pub fn execution(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            error_type: error_type.into(),
            message: message.into(),
            traceback: None,
        }
    }

    /// Create an LLM API error.
    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Whether the failure came from the generated code rather than the plumbing.
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}
