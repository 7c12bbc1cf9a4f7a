//! OpenAI and Azure OpenAI chat backends with JSON Schema structured output.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::llm::{StructuredLlm, StructuredRequest};

/// The default OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default Azure OpenAI API version (first version with structured outputs).
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-01-preview";

/// Where requests are sent and how they authenticate.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenAIEndpoint {
    /// The public OpenAI API or an OpenAI-compatible server.
    OpenAI {
        /// Bearer token.
        api_key: String,
        /// API base URL, without a trailing path.
        base_url: String,
    },
    /// An Azure OpenAI resource; the model is selected by deployment.
    Azure {
        /// The `api-key` header value.
        api_key: String,
        /// Resource endpoint, e.g. `https://my-resource.openai.azure.com/`.
        endpoint: String,
        /// The `api-version` query parameter.
        api_version: String,
    },
}

impl OpenAIEndpoint {
    /// The public OpenAI API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::OpenAI { api_key: api_key.into(), base_url: OPENAI_API_BASE.to_string() }
    }

    /// An Azure OpenAI resource using [`DEFAULT_AZURE_API_VERSION`].
    pub fn azure(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::Azure {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }

    /// Read `OPENAI_API_KEY`, or the Azure variables when `AZURE_OPENAI_ENDPOINT` is set.
    ///
    /// Azure uses `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_ENDPOINT`, and the
    /// optional `AZURE_API_VERSION`.
    pub fn from_env() -> Result<Self> {
        if let Ok(endpoint) = std::env::var("AZURE_OPENAI_ENDPOINT") {
            let api_key = require_env("AZURE_OPENAI_API_KEY")?;
            let api_version = std::env::var("AZURE_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string());
            return Ok(Self::Azure { api_key, endpoint, api_version });
        }
        Ok(Self::openai(require_env("OPENAI_API_KEY")?))
    }

    /// Provider label used in errors and logs.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::OpenAI { .. } => "OpenAI",
            Self::Azure { .. } => "AzureOpenAI",
        }
    }

    /// Build the URL for an operation (`chat/completions`, `embeddings`) on a model.
    pub fn url(&self, operation: &str, model: &str) -> String {
        match self {
            Self::OpenAI { base_url, .. } => {
                format!("{}/{operation}", base_url.trim_end_matches('/'))
            }
            Self::Azure { endpoint, api_version, .. } => format!(
                "{}/openai/deployments/{model}/{operation}?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
        }
    }

    /// Attach authentication headers to a request.
    pub fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::OpenAI { api_key, .. } => builder.bearer_auth(api_key),
            Self::Azure { api_key, .. } => builder.header("api-key", api_key),
        }
    }

    fn api_key(&self) -> &str {
        match self {
            Self::OpenAI { api_key, .. } | Self::Azure { api_key, .. } => api_key,
        }
    }
}

/// Read a required environment variable.
pub fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ModelError::Config(format!("{name} environment variable not set")))
}

/// Map a transport failure to a [`ModelError`].
pub fn transport_error(provider: &str, err: reqwest::Error) -> ModelError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        ModelError::Transient { provider: provider.into(), message: err.to_string() }
    } else {
        ModelError::Api { provider: provider.into(), status: 0, message: err.to_string() }
    }
}

/// Turn a non-success response into a [`ModelError`].
///
/// 429 becomes [`ModelError::RateLimited`] (honouring `retry-after`), 5xx
/// becomes [`ModelError::Transient`], anything else is permanent.
pub async fn status_error(provider: &str, response: reqwest::Response) -> ModelError {
    let status = response.status();
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs * 1000);
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

    error!(provider, %status, "API error");
    if status == StatusCode::TOO_MANY_REQUESTS {
        ModelError::RateLimited { provider: provider.into(), retry_after_ms }
    } else if status.is_server_error() {
        ModelError::Transient { provider: provider.into(), message: format!("{status}: {message}") }
    } else {
        ModelError::Api { provider: provider.into(), status: status.as_u16(), message }
    }
}

/// A [`StructuredLlm`] backed by the chat completions API.
///
/// Requests use `response_format: json_schema` in strict mode; the returned
/// content is still validated locally against the request schema.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_model::openai::{OpenAIChatModel, OpenAIEndpoint};
///
/// let model = OpenAIChatModel::new(OpenAIEndpoint::from_env()?, "gpt-4o")?;
/// ```
pub struct OpenAIChatModel {
    client: reqwest::Client,
    endpoint: OpenAIEndpoint,
    model: String,
}

impl OpenAIChatModel {
    /// Create a client for `model` (the deployment name on Azure).
    pub fn new(endpoint: OpenAIEndpoint, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if endpoint.api_key().is_empty() {
            return Err(ModelError::Config("API key must not be empty".into()));
        }
        if model.is_empty() {
            return Err(ModelError::Config("model must not be empty".into()));
        }
        Ok(Self { client: reqwest::Client::new(), endpoint, model })
    }

    /// Create a client from the environment.
    ///
    /// The model comes from `AZURE_OPENAI_DEPLOYMENT_ID` on Azure and
    /// defaults to `gpt-4o` otherwise.
    pub fn from_env() -> Result<Self> {
        let endpoint = OpenAIEndpoint::from_env()?;
        let model = match &endpoint {
            OpenAIEndpoint::Azure { .. } => require_env("AZURE_OPENAI_DEPLOYMENT_ID")?,
            OpenAIEndpoint::OpenAI { .. } => {
                std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string())
            }
        };
        Self::new(endpoint, model)
    }

    fn request_body<'a>(&'a self, request: &'a StructuredRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = &request.instruction {
            messages.push(ChatMessage { role: "system", content: instruction });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        ChatRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages,
            temperature: request.config.temperature,
            max_tokens: request.config.max_output_tokens,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema.name(),
                    "schema": request.schema.schema(),
                    "strict": true
                }
            }),
        }
    }
}

// ── Chat completions request/response types ──────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl StructuredLlm for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value> {
        let provider = self.endpoint.provider();
        let violations = request.schema.strict_violations();
        if !violations.is_empty() {
            return Err(ModelError::InvalidSchema(format!(
                "{} cannot be sent in strict mode: {}",
                request.schema.name(),
                violations.join("; ")
            )));
        }
        let body = self.request_body(&request);
        let url = self.endpoint.url("chat/completions", body.model);
        debug!(provider, model = body.model, schema = request.schema.name(), "structured request");

        let response = self
            .endpoint
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(provider, e))?;

        if !response.status().is_success() {
            return Err(status_error(provider, response).await);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ModelError::Transient {
            provider: provider.into(),
            message: format!("failed to parse response: {e}"),
        })?;

        let message = parsed.choices.into_iter().next().map(|c| c.message).ok_or_else(|| {
            ModelError::SchemaViolation {
                schema: request.schema.name().to_string(),
                message: "response contained no choices".into(),
            }
        })?;

        match (message.content, message.refusal) {
            (Some(content), _) => request.schema.parse(&content),
            (None, Some(refusal)) => Err(ModelError::SchemaViolation {
                schema: request.schema.name().to_string(),
                message: format!("model refused: {refusal}"),
            }),
            (None, None) => Err(ModelError::SchemaViolation {
                schema: request.schema.name().to_string(),
                message: "response had no content".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OutputSchema;
    use crate::llm::GenerationConfig;

    #[test]
    fn builds_openai_and_azure_urls() {
        let openai = OpenAIEndpoint::openai("sk");
        assert_eq!(openai.url("chat/completions", "gpt-4o"), "https://api.openai.com/v1/chat/completions");

        let azure = OpenAIEndpoint::azure("key", "https://res.openai.azure.com/");
        assert_eq!(
            azure.url("embeddings", "ada"),
            "https://res.openai.azure.com/openai/deployments/ada/embeddings?api-version=2024-10-01-preview"
        );
    }

    #[test]
    fn request_carries_schema_and_temperature() {
        let model = OpenAIChatModel::new(OpenAIEndpoint::openai("sk"), "gpt-4o").unwrap();
        let schema = OutputSchema::new("answer", json!({"type": "object"})).unwrap();
        let request = StructuredRequest::new("q", schema)
            .with_instruction("be brief")
            .with_config(GenerationConfig::deterministic());

        let body = serde_json::to_value(model.request_body(&request)).unwrap();
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["response_format"]["json_schema"]["name"], "answer");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[tokio::test]
    async fn open_schema_is_rejected_before_sending() {
        let model = OpenAIChatModel::new(OpenAIEndpoint::openai("sk"), "gpt-4o").unwrap();
        let schema = OutputSchema::new(
            "judgement",
            json!({
                "type": "object",
                "properties": { "score": { "type": "integer" }, "reason": { "type": "string" } },
                "required": ["score"]
            }),
        )
        .unwrap();

        let err = model.generate_structured(StructuredRequest::new("q", schema)).await.unwrap_err();
        match err {
            ModelError::InvalidSchema(message) => {
                assert!(message.contains("additionalProperties"));
                assert!(message.contains("'reason'"));
            }
            other => panic!("expected InvalidSchema, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_key() {
        assert!(OpenAIChatModel::new(OpenAIEndpoint::openai(""), "gpt-4o").is_err());
    }
}
