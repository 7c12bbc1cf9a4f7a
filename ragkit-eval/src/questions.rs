//! Question-set loading.
//!
//! A question set is a JSON array of `{"question": ..., "answer": ...}`
//! objects, read in order. A malformed entry rejects the whole set with the
//! entry's index; nothing is skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{EvalError, Result};

/// One question with its ground-truth answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionAnswer {
    /// The question put to the pipeline.
    pub question: String,
    /// The expected answer.
    pub answer: String,
}

impl QuestionAnswer {
    /// Create a question/answer pair.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// Parse a question set from JSON text.
///
/// # Errors
///
/// - [`EvalError::MalformedQuestionSet`] if the text is not a JSON array
/// - [`EvalError::InvalidQuestionSet`] with the entry index if an entry
///   lacks a field, has an extra or non-string field, or has blank text
pub fn from_json_str(text: &str) -> Result<Vec<QuestionAnswer>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| EvalError::MalformedQuestionSet(format!("invalid JSON: {e}")))?;
    let Value::Array(entries) = value else {
        return Err(EvalError::MalformedQuestionSet("expected a JSON array".to_string()));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let qa: QuestionAnswer = serde_json::from_value(entry)
                .map_err(|e| EvalError::InvalidQuestionSet { index, message: e.to_string() })?;
            if qa.question.trim().is_empty() {
                return Err(EvalError::InvalidQuestionSet {
                    index,
                    message: "question is blank".to_string(),
                });
            }
            if qa.answer.trim().is_empty() {
                return Err(EvalError::InvalidQuestionSet {
                    index,
                    message: "answer is blank".to_string(),
                });
            }
            Ok(qa)
        })
        .collect()
}

/// Read and parse a question-set file.
///
/// # Errors
///
/// Returns [`EvalError::Io`] if the file cannot be read, otherwise see
/// [`from_json_str`].
pub async fn load_question_set(path: impl AsRef<Path>) -> Result<Vec<QuestionAnswer>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|source| {
        error!(path = %path.display(), error = %source, "failed to read question set");
        EvalError::Io { path: path.display().to_string(), source }
    })?;
    let questions = from_json_str(&text)?;
    debug!(path = %path.display(), count = questions.len(), "loaded question set");
    Ok(questions)
}
