//! The vector index: chunks embedded once at build time, queried by similarity.
//!
//! [`VectorIndex`] has no mutation API. It is produced by
//! [`VectorIndexBuilder::build`], which embeds every chunk exactly once, and
//! is read-only afterwards.

use std::sync::Arc;

use ragkit_model::{CallLimiter, RetryPolicy, with_retry};
use tracing::{debug, error, info};

use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::{DistanceMetric, InMemoryVectorStore};
use crate::vectorstore::{IndexedChunk, VectorStore};

/// Default number of chunks per embedding request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 16;

/// A read-only similarity index over one document's chunks.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_rag::VectorIndex;
///
/// let index = VectorIndex::builder()
///     .embedding_provider(Arc::new(embedder))
///     .build(chunks)
///     .await?;
/// let hits = index.query("why is the sky blue?", 2).await?;
/// ```
pub struct VectorIndex {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retry_policy: RetryPolicy,
    limiter: CallLimiter,
    len: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("embedding_provider", &self.embedding_provider.name())
            .field("len", &self.len)
            .finish()
    }
}

impl VectorIndex {
    /// Create a new [`VectorIndexBuilder`].
    pub fn builder() -> VectorIndexBuilder {
        VectorIndexBuilder::default()
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return up to `k` chunks most similar to `text`, highest score first.
    ///
    /// The query text is embedded once per call. Equal scores are ordered by
    /// chunk position. `k` larger than the index returns every chunk; an
    /// empty index or `k == 0` returns nothing without calling the backend.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding (after retries) or
    /// search fails.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 || self.is_empty() {
            debug!(k, len = self.len, "query skipped");
            return Ok(Vec::new());
        }

        let mut embeddings = embed_resilient(
            self.embedding_provider.as_ref(),
            &[text],
            &self.retry_policy,
            &self.limiter,
        )
        .await
        .map_err(|e| {
            error!(error = %e, "embedding failed during query");
            RagError::PipelineError(format!("query embedding failed: {e}"))
        })?;
        let query_embedding = embeddings.pop().unwrap_or_default();

        let results = self.store.search(&query_embedding, k).await.map_err(|e| {
            error!(error = %e, "vector store search failed");
            RagError::PipelineError(format!("search failed: {e}"))
        })?;

        debug!(k, result_count = results.len(), "query completed");
        Ok(results)
    }
}

/// Embed a batch under the retry policy, holding a limiter permit per attempt.
///
/// Verifies one vector per input, each with the provider's dimensionality.
async fn embed_resilient(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    policy: &RetryPolicy,
    limiter: &CallLimiter,
) -> Result<Vec<Vec<f32>>> {
    let operation = format!("embed ({})", provider.name());
    let embeddings =
        with_retry(policy, &operation, || limiter.run(provider.embed_batch(texts))).await?;

    if embeddings.len() != texts.len() {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("returned {} embeddings for {} inputs", embeddings.len(), texts.len()),
        });
    }
    let expected = provider.dimensions();
    if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("returned a {}-dimensional vector, expected {expected}", bad.len()),
        });
    }
    Ok(embeddings)
}

/// Builder for a [`VectorIndex`].
///
/// The embedding provider is required. The store defaults to an
/// [`InMemoryVectorStore`] with the configured metric; the retry policy and
/// limiter default to [`RetryPolicy::default`] and [`CallLimiter::default`].
pub struct VectorIndexBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    metric: DistanceMetric,
    retry_policy: RetryPolicy,
    limiter: CallLimiter,
    batch_size: usize,
}

impl Default for VectorIndexBuilder {
    fn default() -> Self {
        Self {
            embedding_provider: None,
            vector_store: None,
            metric: DistanceMetric::default(),
            retry_policy: RetryPolicy::default(),
            limiter: CallLimiter::default(),
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

impl VectorIndexBuilder {
    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Use a specific vector store. It must be empty.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Similarity metric for the default in-memory store.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Backoff policy for embedding calls.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Shared limiter for embedding calls.
    pub fn limiter(mut self, limiter: CallLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Chunks per embedding request.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Embed every chunk once and store it.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if no embedding provider is set, the
    ///   batch size is zero, the retry policy is invalid, or the store is
    ///   not empty
    /// - [`RagError::PipelineError`] naming the failed chunk range if
    ///   embedding fails permanently or exhausts its retries
    pub async fn build(self, chunks: Vec<Chunk>) -> Result<VectorIndex> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        if self.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".to_string()));
        }
        self.retry_policy.validate()?;
        let store = self
            .vector_store
            .unwrap_or_else(|| Arc::new(InMemoryVectorStore::with_metric(self.metric)));
        if !store.is_empty().await {
            return Err(RagError::ConfigError("vector store must be empty".to_string()));
        }

        let total = chunks.len();
        let mut entries = Vec::with_capacity(total);
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let first = batch_no * self.batch_size;
            let embeddings = embed_resilient(
                embedding_provider.as_ref(),
                &texts,
                &self.retry_policy,
                &self.limiter,
            )
            .await
            .map_err(|e| {
                error!(first, count = texts.len(), error = %e, "embedding failed during index build");
                RagError::PipelineError(format!(
                    "embedding failed for chunks {first}..{}: {e}",
                    first + texts.len()
                ))
            })?;

            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexedChunk { chunk, embedding }),
            );
            debug!(embedded = entries.len(), total, "embedded batch");
        }

        store.insert(entries).await.map_err(|e| {
            error!(error = %e, "insert failed during index build");
            RagError::PipelineError(format!("insert failed: {e}"))
        })?;

        info!(chunk_count = total, provider = embedding_provider.name(), "built vector index");

        Ok(VectorIndex {
            embedding_provider,
            store,
            retry_policy: self.retry_policy,
            limiter: self.limiter,
            len: total,
        })
    }
}
