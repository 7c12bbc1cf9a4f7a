//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Separator placed between consecutive text blocks when a document is
/// flattened into one stream. A blank line, so block edges are paragraph
/// boundaries for the chunker.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// A source document: ordered text blocks (e.g. PDF pages) and metadata.
///
/// Immutable once constructed; the chunker reads it as a single stream via
/// [`Document::text`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Extracted text blocks in source order.
    pub blocks: Vec<String>,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document from ordered text blocks.
    pub fn new(id: impl Into<String>, blocks: Vec<String>) -> Self {
        Self { id: id.into(), blocks, metadata: HashMap::new(), source_uri: None }
    }

    /// Create a single-block document.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, vec![text.into()])
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Record where the document came from.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// The full text: blocks joined by [`BLOCK_SEPARATOR`].
    pub fn text(&self) -> String {
        self.blocks.join(BLOCK_SEPARATOR)
    }

    /// Whether the document has no text at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_empty())
    }
}

/// A contiguous span of a [`Document`]'s normalized text.
///
/// `start` and `end` are character offsets into the normalized text;
/// consecutive chunks from the same document have strictly increasing
/// `start` and overlap by the configured number of characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// Position of the chunk within its document.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Character offset where the chunk begins.
    pub start: usize,
    /// Character offset one past the chunk's last character.
    pub end: usize,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Render retrieved context items as numbered blocks for display.
pub fn format_context(context: &[String]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Context {}:\n{c}\n", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
