//! Error types for the `ragkit-eval` crate.

use ragkit_model::ModelError;
use ragkit_rag::RagError;
use thiserror::Error;

/// Errors raised while loading questions, answering them, or scoring them.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The harness or a metric was configured inconsistently.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The question-set file is not a JSON array.
    #[error("Malformed question set: {0}")]
    MalformedQuestionSet(String),

    /// One entry of the question set is malformed.
    #[error("Invalid question set entry {index}: {message}")]
    InvalidQuestionSet {
        /// Zero-based position of the entry.
        index: usize,
        /// What was wrong with it.
        message: String,
    },

    /// A file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// The file being read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Retrieval failed for one question.
    #[error("Retrieval failed for question {index}: {message}")]
    Retrieval {
        /// Zero-based question position.
        index: usize,
        /// The underlying failure.
        message: String,
    },

    /// Answer generation failed for one question.
    #[error("Generation failed for question {index}: {message}")]
    Generation {
        /// Zero-based question position.
        index: usize,
        /// The underlying failure.
        message: String,
    },

    /// A judge response was well-formed but inconsistent with its request.
    #[error("Invalid judgement from metric '{metric}': {message}")]
    InvalidJudgement {
        /// The metric being scored.
        metric: String,
        /// What was inconsistent.
        message: String,
    },

    /// An error propagated from a model backend.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An error propagated from the retrieval pipeline.
    #[error(transparent)]
    Rag(#[from] RagError),
}

/// A convenience result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;
