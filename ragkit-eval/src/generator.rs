//! Grounded answer generation.
//!
//! Rendering the prompt and invoking the model are two plain steps: the
//! question and joined context fill a fixed template, then one structured
//! request asks for a single `answer` field.

use std::sync::Arc;

use ragkit_model::{GenerationConfig, OutputSchema, StructuredLlm, StructuredRequest};
use serde_json::json;
use tracing::{debug, error};

use crate::error::{EvalError, Result};

/// Separator placed between retrieved passages in the prompt.
pub const CONTEXT_SEPARATOR: &str = " ";

const ANSWER_FIELD: &str = "answer";

/// Join retrieved passages into the single context string the prompt expects.
pub fn join_context(context: &[String]) -> String {
    context.join(CONTEXT_SEPARATOR)
}

/// Render the answer prompt for one question.
pub fn render_prompt(question: &str, context: &str) -> String {
    format!(
        "For the question below, provide a concise but sufficient answer based ONLY on the \
         provided context:\n{context}\nQuestion\n{question}"
    )
}

/// Answers questions from supplied context with one structured model call.
///
/// Temperature is pinned at zero. Calls are independent; nothing is carried
/// over between questions.
///
/// # Example
///
/// ```rust,ignore
/// let generator = AnswerGenerator::new(llm)?;
/// let answer = generator.generate("Why is the sky blue?", &join_context(&context)).await?;
/// ```
pub struct AnswerGenerator {
    llm: Arc<dyn StructuredLlm>,
    schema: OutputSchema,
    config: GenerationConfig,
    model: Option<String>,
}

impl AnswerGenerator {
    /// Create a generator over the given model.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Model`] if the answer schema fails to compile.
    pub fn new(llm: Arc<dyn StructuredLlm>) -> Result<Self> {
        let schema = OutputSchema::new(
            "question_answer_from_context",
            json!({
                "type": "object",
                "properties": {
                    ANSWER_FIELD: {
                        "type": "string",
                        "description": "An answer to the question based on the given context."
                    }
                },
                "required": [ANSWER_FIELD],
                "additionalProperties": false
            }),
        )?;
        Ok(Self { llm, schema, config: GenerationConfig::deterministic(), model: None })
    }

    /// Route requests to a specific model or deployment.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Cap the answer length.
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.config = self.config.with_max_output_tokens(max);
        self
    }

    /// Sampling parameters sent with every request.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Answer `question` using only `context`.
    ///
    /// An empty context is sent as-is; the model is expected to say it
    /// cannot answer rather than the call failing.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Model`] if the model call fails or its response
    /// does not match the answer schema.
    pub async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let mut request = StructuredRequest::new(render_prompt(question, context), self.schema.clone())
            .with_config(self.config.clone());
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let value = self.llm.generate_structured(request).await.map_err(|e| {
            error!(model = self.llm.name(), error = %e, "answer generation failed");
            EvalError::from(e)
        })?;

        let answer = value
            .get(ANSWER_FIELD)
            .and_then(|a| a.as_str())
            .ok_or_else(|| {
                EvalError::Model(ragkit_model::ModelError::SchemaViolation {
                    schema: self.schema.name().to_string(),
                    message: format!("missing string field '{ANSWER_FIELD}'"),
                })
            })?
            .to_string();

        debug!(context_chars = context.len(), answer_chars = answer.len(), "generated answer");
        Ok(answer)
    }
}
