//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::inmemory::DistanceMetric;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks the retriever returns per question.
    pub top_k: usize,
    /// Number of chunks sent to the embedding backend per request.
    pub embed_batch_size: usize,
    /// Similarity metric used by the in-memory index.
    pub metric: DistanceMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 2,
            embed_batch_size: 16,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate a chunk size / overlap pair.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks returned per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set how many chunks are embedded per backend request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the similarity metric.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
