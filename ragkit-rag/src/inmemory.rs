//! In-memory vector store with exact nearest-neighbour search.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `Vec` protected by a `tokio::sync::RwLock`. A single document's
//! chunks fit comfortably, and brute-force search is exact.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexedChunk, VectorStore};

const BACKEND: &str = "InMemory";

/// Similarity measure used to rank stored vectors against a query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// `1 / (1 + ‖a − b‖₂)`, in `(0, 1]`.
    Euclidean,
}

impl DistanceMetric {
    /// Similarity between two vectors; higher is closer.
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        let score = match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Euclidean => {
                let distance: f32 =
                    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
                1.0 / (1.0 + distance)
            }
        };
        if score.is_nan() { f32::NEG_INFINITY } else { score }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Default)]
struct Entries {
    items: Vec<IndexedChunk>,
    ids: HashSet<String>,
    dimensions: Option<usize>,
}

/// An in-memory vector store using exact similarity search.
///
/// All vectors must share one dimensionality, fixed by the first insert.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_rag::{DistanceMetric, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::with_metric(DistanceMetric::Euclidean);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Entries>,
    metric: DistanceMetric,
}

impl InMemoryVectorStore {
    /// Create a new empty store using cosine similarity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store using the given metric.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self { entries: RwLock::default(), metric }
    }

    /// The metric used for search.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

fn store_error(message: String) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, entries: Vec<IndexedChunk>) -> Result<()> {
        let mut store = self.entries.write().await;

        let mut dimensions = store.dimensions;
        let mut batch_ids = HashSet::new();
        for entry in &entries {
            let dims = *dimensions.get_or_insert(entry.embedding.len());
            if entry.embedding.len() != dims {
                return Err(store_error(format!(
                    "chunk '{}' has {} dimensions, expected {dims}",
                    entry.chunk.id,
                    entry.embedding.len()
                )));
            }
            if store.ids.contains(&entry.chunk.id) || !batch_ids.insert(entry.chunk.id.as_str()) {
                return Err(store_error(format!("duplicate chunk id '{}'", entry.chunk.id)));
            }
        }

        store.dimensions = dimensions;
        for entry in entries {
            store.ids.insert(entry.chunk.id.clone());
            store.items.push(entry);
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let store = self.entries.read().await;
        if let Some(dims) = store.dimensions {
            if embedding.len() != dims {
                return Err(store_error(format!(
                    "query has {} dimensions, index has {dims}",
                    embedding.len()
                )));
            }
        }

        let mut scored: Vec<SearchResult> = store
            .items
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: self.metric.similarity(&entry.embedding, embedding),
            })
            .collect();

        // Stable sort: equal scores stay in insertion (chunk) order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.items.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn entry(id: &str, index: usize, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk {
                id: id.to_string(),
                index,
                text: format!("text {id}"),
                start: 0,
                end: 0,
                metadata: HashMap::new(),
                document_id: "doc".to_string(),
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .insert(vec![entry("a", 0, vec![1.0, 0.0]), entry("b", 1, vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store.search(&[0.1, 0.9], 2).await.unwrap();
        assert_eq!(results[0].chunk.id, "b");
        assert_eq!(results[1].chunk.id, "a");
    }

    #[tokio::test]
    async fn ties_keep_chunk_order() {
        let store = InMemoryVectorStore::new();
        let same = vec![0.6, 0.8];
        store
            .insert(vec![
                entry("first", 0, same.clone()),
                entry("second", 1, same.clone()),
                entry("third", 2, same.clone()),
            ])
            .await
            .unwrap();

        let ids: Vec<_> =
            store.search(&same, 3).await.unwrap().into_iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn k_larger_than_store_returns_all() {
        let store = InMemoryVectorStore::new();
        store.insert(vec![entry("a", 0, vec![1.0])]).await.unwrap();
        assert_eq!(store.search(&[1.0], 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new();
        assert!(store.is_empty().await);
        assert!(store.search(&[1.0, 2.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_duplicates_and_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.insert(vec![entry("a", 0, vec![1.0, 0.0])]).await.unwrap();

        assert!(store.insert(vec![entry("a", 1, vec![0.0, 1.0])]).await.is_err());
        assert!(store.insert(vec![entry("b", 1, vec![0.0, 1.0, 0.0])]).await.is_err());
        assert!(store.search(&[1.0], 1).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn euclidean_similarity_is_one_for_identical_vectors() {
        let metric = DistanceMetric::Euclidean;
        assert_eq!(metric.similarity(&[1.0, 2.0], &[1.0, 2.0]), 1.0);
        assert!(metric.similarity(&[0.0, 0.0], &[3.0, 4.0]) < 0.2);
    }
}
