//! Error types for the `ragkit-model` crate.

use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryableError;

/// Errors that can occur when calling a model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The backend rejected the call because of rate limiting.
    #[error("Rate limited by {provider}")]
    RateLimited {
        /// The backend that produced the error.
        provider: String,
        /// Server-suggested delay before retrying, if any.
        retry_after_ms: Option<u64>,
    },

    /// A transient failure (timeout, connection reset, 5xx) that may succeed on retry.
    #[error("Transient error ({provider}): {message}")]
    Transient {
        /// The backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A permanent API failure, such as an authentication or bad-request error.
    #[error("API error ({provider}, status {status}): {message}")]
    Api {
        /// The backend that produced the error.
        provider: String,
        /// HTTP status code returned by the backend.
        status: u16,
        /// A description of the failure.
        message: String,
    },

    /// Structured output did not conform to the requested schema.
    #[error("Output does not match schema '{schema}': {message}")]
    SchemaViolation {
        /// Name of the schema the output was validated against.
        schema: String,
        /// What was wrong with the output.
        message: String,
    },

    /// The output schema itself is not a valid JSON Schema.
    #[error("Invalid output schema: {0}")]
    InvalidSchema(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every retry attempt failed with a transient error.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The operation being retried.
        operation: String,
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        last: Box<ModelError>,
    },
}

impl RetryableError for ModelError {
    fn is_transient(&self) -> bool {
        matches!(self, ModelError::RateLimited { .. } | ModelError::Transient { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelError::RateLimited { retry_after_ms: Some(ms), .. } => {
                Some(Duration::from_millis(*ms))
            }
            _ => None,
        }
    }

    fn exhausted(operation: &str, attempts: u32, last: Self) -> Self {
        ModelError::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
            last: Box::new(last),
        }
    }
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
