//! OpenAI / Azure OpenAI embedding provider using the embeddings API.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use ragkit_model::openai::{OpenAIEndpoint, require_env, status_error, transport_error};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default model for OpenAI embeddings.
const DEFAULT_MODEL: &str = "text-embedding-ada-002";

/// The dimensionality of `text-embedding-ada-002`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// Uses `reqwest` to call the `/embeddings` endpoint directly. On Azure the
/// model is the embedding deployment name.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-ada-002`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - credentials – from the [`OpenAIEndpoint`] passed in, or the environment.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    endpoint: OpenAIEndpoint,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider for the given endpoint with the default model.
    pub fn new(endpoint: OpenAIEndpoint) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        }
    }

    /// Create a provider from the environment.
    ///
    /// On Azure the deployment comes from `AZURE_OPENAI_EMBEDDING_DEPLOYMENT_ID`.
    pub fn from_env() -> Result<Self> {
        let endpoint = OpenAIEndpoint::from_env()?;
        let provider = match &endpoint {
            OpenAIEndpoint::Azure { .. } => {
                let deployment = require_env("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_ID")?;
                Self::new(endpoint).with_model(deployment)
            }
            OpenAIEndpoint::OpenAI { .. } => Self::new(endpoint),
        };
        Ok(provider)
    }

    /// Set the model name (or Azure deployment).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

// ── Embeddings API request/response types ──────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        self.endpoint.provider()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: self.name().into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.endpoint.provider();
        debug!(provider, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body =
            EmbeddingRequest { model: &self.model, input: texts, dimensions: self.request_dimensions };

        let response = self
            .endpoint
            .authorize(self.client.post(self.endpoint.url("embeddings", &self.model)))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider, error = %e, "request failed");
                transport_error(provider, e)
            })?;

        if !response.status().is_success() {
            return Err(status_error(provider, response).await.into());
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider, error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: provider.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
