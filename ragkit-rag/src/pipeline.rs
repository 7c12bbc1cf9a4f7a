//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the build-time workflow (chunk → embed →
//! index) and hands out a [`VectorRetriever`] for query time.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit_rag::{RagPipeline, RagConfig};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let retriever = pipeline.ingest(&document).await?;
//! let context = retriever.retrieve("What causes climate change?").await?;
//! ```

use std::sync::Arc;

use ragkit_model::{CallLimiter, RetryPolicy};
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::retriever::VectorRetriever;

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    retry_policy: RetryPolicy,
    limiter: CallLimiter,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Build a read-only index over one document: chunk → embed → store.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidDocument`] if chunking finds a chunk without text
    /// - [`RagError::PipelineError`] if embedding fails after retries,
    ///   including the document ID in the error message
    pub async fn build_index(&self, document: &Document) -> Result<VectorIndex> {
        let chunks = self.chunker.chunk(document).map_err(|e| {
            error!(document.id = %document.id, error = %e, "chunking failed");
            e
        })?;
        let chunk_count = chunks.len();

        let index = VectorIndex::builder()
            .embedding_provider(self.embedding_provider.clone())
            .metric(self.config.metric)
            .retry_policy(self.retry_policy.clone())
            .limiter(self.limiter.clone())
            .batch_size(self.config.embed_batch_size)
            .build(chunks)
            .await
            .map_err(|e| {
                error!(document.id = %document.id, error = %e, "index build failed");
                RagError::PipelineError(format!("indexing failed for document '{}': {e}", document.id))
            })?;

        info!(document.id = %document.id, chunk_count, "indexed document");
        Ok(index)
    }

    /// Wrap an index in a retriever using the configured `top_k`.
    pub fn retriever(&self, index: Arc<VectorIndex>) -> VectorRetriever {
        VectorRetriever::new(index, self.config.top_k)
    }

    /// Index a document and return a retriever over it.
    ///
    /// # Errors
    ///
    /// See [`build_index`](RagPipeline::build_index).
    pub async fn ingest(&self, document: &Document) -> Result<VectorRetriever> {
        let index = self.build_index(document).await?;
        Ok(self.retriever(Arc::new(index)))
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config` and `embedding_provider` are required. The chunker defaults to a
/// [`RecursiveChunker`] using the configured size and overlap.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .retry_policy(RetryPolicy::default())   // optional
///     .limiter(CallLimiter::new(4))           // optional, share with the generator
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    retry_policy: Option<RetryPolicy>,
    limiter: Option<CallLimiter>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the backoff policy for embedding calls.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set the limiter shared by every backend call.
    pub fn limiter(mut self, limiter: CallLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the configuration is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let retry_policy = self.retry_policy.unwrap_or_default();
        retry_policy.validate()?;

        Ok(RagPipeline {
            config,
            embedding_provider,
            chunker,
            retry_policy,
            limiter: self.limiter.unwrap_or_default(),
        })
    }
}
