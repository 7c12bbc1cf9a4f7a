//! Error types for the `ragkit-rag` crate.

use std::time::Duration;

use ragkit_model::{ModelError, RetryableError};
use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend rate-limited the request.
    #[error("Rate limited by {provider}")]
    RateLimited {
        /// The embedding provider that produced the error.
        provider: String,
        /// Server-suggested delay before retrying, if any.
        retry_after_ms: Option<u64>,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A document or one of its chunks failed an integrity check.
    #[error("Invalid document '{document_id}': {message}")]
    InvalidDocument {
        /// The offending document.
        document_id: String,
        /// What was wrong with it.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A source file could not be loaded.
    #[error("Failed to load '{path}': {message}")]
    LoaderError {
        /// The file that failed to load.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// An error propagated from a model backend.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl RetryableError for RagError {
    fn is_transient(&self) -> bool {
        match self {
            RagError::RateLimited { .. } => true,
            RagError::Model(inner) => inner.is_transient(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RagError::RateLimited { retry_after_ms: Some(ms), .. } => {
                Some(Duration::from_millis(*ms))
            }
            RagError::Model(inner) => inner.retry_after(),
            _ => None,
        }
    }

    fn exhausted(operation: &str, attempts: u32, last: Self) -> Self {
        RagError::PipelineError(format!("{operation} failed after {attempts} attempts: {last}"))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
