//! Loading extracted document text from disk.
//!
//! Text extraction from PDFs happens outside this crate. [`TextFileLoader`]
//! reads the extractor's output, where pages are separated by form-feed
//! characters (the `pdftotext` convention), into an ordered [`Document`].

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Page separator emitted by common PDF text extractors.
pub const PAGE_BREAK: char = '\x0c';

/// Turns a source file into a [`Document`].
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the file at `path`.
    async fn load(&self, path: &Path) -> Result<Document>;
}

/// Loads UTF-8 text, one block per form-feed-separated page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFileLoader;

impl TextFileLoader {
    /// Split extracted text into page blocks, dropping a trailing empty page.
    pub fn blocks(text: &str) -> Vec<String> {
        let mut blocks: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        if blocks.len() > 1 && blocks.last().is_some_and(|b| b.trim().is_empty()) {
            blocks.pop();
        }
        blocks
    }
}

#[async_trait]
impl DocumentLoader for TextFileLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| RagError::LoaderError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or("document").to_string();
        let blocks = Self::blocks(&text);
        info!(document.id = %id, block_count = blocks.len(), "loaded document");

        Ok(Document::new(id, blocks).with_source_uri(path.display().to_string()))
    }
}
