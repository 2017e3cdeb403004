//! Error taxonomy for the retrieval pipeline.
//!
//! Validation and configuration errors are surfaced before any external call
//! is made. Transient provider failures get exactly one retry within the
//! remaining query deadline; anything past that is a hard external error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Bad caller input: empty or oversized question, malformed metadata.
    #[error("validation error: {0}")]
    Validation(String),

    /// Inconsistent settings detected at init (dimension mismatch, weights).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Retryable provider failure (timeout, connect, rate limit, 5xx).
    #[error("transient failure in {provider}: {message}")]
    TransientExternal { provider: String, message: String },

    /// Non-retryable provider failure or exhausted deadline.
    #[error("external failure in {provider}: {message}")]
    HardExternal { provider: String, message: String },

    /// No candidates survived any retrieval stage. Not a fault: callers
    /// render a no-results response.
    #[error("no results after all retrieval stages")]
    EmptyResult,

    /// Invariant violation inside the pipeline.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientExternal {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn hard(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HardExternal {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientExternal { .. })
    }

    /// Demote a transient error to its hard form after the retry budget is
    /// spent, keeping the provider attribution.
    pub fn into_hard(self) -> Self {
        match self {
            Self::TransientExternal { provider, message } => {
                Self::HardExternal { provider, message }
            }
            other => other,
        }
    }
}
