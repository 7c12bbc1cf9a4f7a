//! The per-question tuple handed to metrics.

use serde::{Deserialize, Serialize};

/// One answered question, ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// The question as asked.
    pub question: String,
    /// Ground-truth answer from the question set.
    pub expected_output: String,
    /// The generated answer.
    pub actual_output: String,
    /// Retrieved context passages, in ranked order. May be empty.
    pub retrieval_context: Vec<String>,
}
