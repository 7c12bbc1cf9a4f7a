//! The structured-output language model capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::schema::OutputSchema;

/// Sampling parameters for a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GenerationConfig {
    /// Sampling temperature. `Some(0.0)` asks for the most deterministic output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    /// Greedy decoding: temperature fixed at zero.
    pub fn deterministic() -> Self {
        Self { temperature: Some(0.0), max_output_tokens: None }
    }

    /// Set the maximum number of output tokens.
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }
}

/// One request for schema-conforming output.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    /// Optional system instruction.
    pub instruction: Option<String>,
    /// The rendered user prompt.
    pub prompt: String,
    /// Schema the response must satisfy.
    pub schema: OutputSchema,
    /// Sampling parameters.
    pub config: GenerationConfig,
    /// Overrides the backend's default model or deployment when set.
    pub model: Option<String>,
}

impl StructuredRequest {
    /// Create a request with default sampling parameters.
    pub fn new(prompt: impl Into<String>, schema: OutputSchema) -> Self {
        Self {
            instruction: None,
            prompt: prompt.into(),
            schema,
            config: GenerationConfig::default(),
            model: None,
        }
    }

    /// Set the system instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the sampling parameters.
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Route the request to a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A language model that returns JSON conforming to a requested schema.
///
/// Implementations must validate the response against
/// [`StructuredRequest::schema`] and report a mismatch as
/// [`ModelError::SchemaViolation`](crate::ModelError::SchemaViolation)
/// instead of coercing it. Calls are independent: no conversation state is
/// carried between them.
#[async_trait]
pub trait StructuredLlm: Send + Sync {
    /// Identifier of the default model behind this backend.
    fn name(&self) -> &str;

    /// Issue one request and return the validated JSON value.
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value>;
}
