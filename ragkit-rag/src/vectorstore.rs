//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A [`Chunk`] paired with the embedding computed for it at index-build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// Its embedding vector.
    pub embedding: Vec<f32>,
}

/// A storage backend for vector embeddings with similarity search.
///
/// Entries are kept in insertion order. Search returns at most `top_k`
/// results by descending similarity; equal scores keep insertion order so
/// repeated searches are deterministic.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.insert(entries).await?;
/// let results = store.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append entries. Chunk IDs must be unique across the store.
    async fn insert(&self, entries: Vec<IndexedChunk>) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// A `top_k` larger than the store returns every entry.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    /// Whether the store holds no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
