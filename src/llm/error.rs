//! Error types for completion requests.

use thiserror::Error;

/// Errors surfaced by a completion request.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// HTTP request failed before a response was read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider asked the caller to slow down.
    #[error("rate limit exceeded: {message}")]
    RateLimited {
        /// Human-readable provider message, normally carrying a wait hint.
        message: String,
    },

    /// Any other provider-side error.
    #[error("provider returned {status}: {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Provider error code, when present.
        code: Option<String>,
        /// Provider error message.
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// The configured rate-limit retry ceiling was reached.
    #[error("rate limit persisted after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Last provider message.
        message: String,
    },
}

impl CompletionError {
    /// Check if this error is a rate-limit signal.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Provider message attached to a rate-limit signal.
    #[must_use]
    pub fn rate_limit_message(&self) -> Option<&str> {
        match self {
            Self::RateLimited { message } => Some(message),
            _ => None,
        }
    }
}

/// Convenience result alias for completion requests.
pub type CompletionResult<T> = Result<T, CompletionError>;
