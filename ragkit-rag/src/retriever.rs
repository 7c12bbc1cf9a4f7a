//! Question → ranked context texts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::index::VectorIndex;

/// Something that returns ranked context passages for a question.
///
/// The evaluation harness depends on this trait rather than on
/// [`VectorRetriever`], so fixed or empty retrievers can stand in.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ranked context texts, most relevant first. May be empty.
    async fn retrieve(&self, question: &str) -> Result<Vec<String>>;
}

/// Thin adapter over a [`VectorIndex`] with a fixed `k`.
///
/// Similarity scores are discarded; only chunk texts are returned, exactly
/// as ranked (no deduplication).
#[derive(Debug, Clone)]
pub struct VectorRetriever {
    index: Arc<VectorIndex>,
    top_k: usize,
}

impl VectorRetriever {
    /// Create a retriever returning at most `top_k` texts per question.
    pub fn new(index: Arc<VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    /// The configured result count.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The underlying index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<String>> {
        let results = self.index.query(question, self.top_k).await?;
        debug!(top_k = self.top_k, retrieved = results.len(), "retrieved context");
        Ok(results.into_iter().map(|r| r.chunk.text).collect())
    }
}

/// A retriever that always returns the same passages.
///
/// Useful for evaluating generation in isolation from retrieval.
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    context: Vec<String>,
}

impl StaticRetriever {
    /// Always return `context`.
    pub fn new(context: Vec<String>) -> Self {
        Self { context }
    }

    /// Always return nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _question: &str) -> Result<Vec<String>> {
        Ok(self.context.clone())
    }
}
