//! # ragkit-rag
//!
//! Build-time and query-time halves of a retrieval-augmented generation
//! pipeline.
//!
//! ## Overview
//!
//! - [`RecursiveChunker`]: overlapping fixed-size chunks that break at
//!   paragraph, sentence, or word boundaries when possible
//! - [`EmbeddingProvider`]: "text → vector" backends
//! - [`VectorIndex`]: chunks embedded once, queried by k-nearest-neighbour
//! - [`Retriever`] / [`VectorRetriever`]: question in, ranked texts out
//! - [`RagPipeline`]: document → index → retriever
//! - [`TextFileLoader`]: extracted page text from disk
//! - `openai::OpenAIEmbeddingProvider`: OpenAI / Azure (feature `openai`)

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod loader;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker, normalize_whitespace};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult, format_context};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use index::{VectorIndex, VectorIndexBuilder};
pub use inmemory::{DistanceMetric, InMemoryVectorStore};
pub use loader::{DocumentLoader, TextFileLoader};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::{Retriever, StaticRetriever, VectorRetriever};
pub use vectorstore::{IndexedChunk, VectorStore};
