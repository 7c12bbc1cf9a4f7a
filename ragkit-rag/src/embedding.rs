//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. Calls must be idempotent per input: the index build may retry
/// a batch after a transient failure. Transient failures should surface as
/// [`RagError::RateLimited`](crate::RagError::RateLimited) or a transient
/// [`RagError::Model`](crate::RagError::Model) so they are retried.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// An offline provider using the hashing trick over lowercase word tokens.
///
/// Each alphanumeric token is hashed (FNV-1a) into one of `dimensions`
/// buckets; the resulting term-count vector is L2-normalized. Texts sharing
/// vocabulary get high cosine similarity, which is enough for demos and
/// deterministic tests without a network backend.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing `dimensions`-length vectors (minimum 1).
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = token
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3));
        (hash % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn name(&self) -> &str {
        "Hashing"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
