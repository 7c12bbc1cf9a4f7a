//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text into windows of at most `chunk_size` characters. Each window
//! ends at the best boundary available: a paragraph break, then a sentence
//! end, then a word gap, and only then an arbitrary character. Every chunk
//! after the first starts exactly `chunk_overlap` characters before the end
//! of the previous one, so adjacent chunks share a constant-length overlap
//! and together cover the whole text.

use tracing::debug;

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Boundary hierarchy, coarsest first.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidDocument`] if a chunk would contain no
    /// textual content.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Drop trailing whitespace and replace tab characters with single spaces.
///
/// Neither step moves a character, so offsets into the normalized text are
/// offsets into the original.
pub fn normalize_whitespace(text: &str) -> String {
    text.trim_end().replace('\t', " ")
}

/// Splits text hierarchically with a constant overlap between chunks.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` using [`DEFAULT_SEPARATORS`].
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared with the previous chunk
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the boundary hierarchy. An empty list splits purely by size.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute `(start, end)` character spans over already-normalized text.
    pub fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let len = chars.len();
        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let separators: Vec<Vec<char>> =
            self.separators.iter().map(|s| s.chars().collect()).collect();
        let mut start = 0;
        loop {
            let limit = start + self.chunk_size;
            if limit >= len {
                spans.push((start, len));
                break;
            }
            let end = best_break(chars, start, start + self.chunk_overlap, limit, &separators);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
        spans
    }

    /// Split raw text into chunk strings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidDocument`] (with an empty document id) if
    /// a chunk has no textual content.
    pub fn split_text(&self, text: &str) -> Result<Vec<String>> {
        let document = Document::from_text("", text);
        Ok(self.chunk(&document)?.into_iter().map(|c| c.text).collect())
    }
}

/// Choose where a chunk starting at `start` should end.
///
/// The break must fall in `(lo, hi]`, where `lo = start + overlap`, so the
/// next chunk starts strictly after this one, and it must keep at least one
/// non-whitespace character in the chunk. Separators are tried in order;
/// the first one with an occurrence in range wins, using its last
/// occurrence. With no separator in range the chunk is cut at `hi`.
fn best_break(
    chars: &[char],
    start: usize,
    lo: usize,
    hi: usize,
    separators: &[Vec<char>],
) -> usize {
    let Some(first_content) = (start..hi).find(|&i| !chars[i].is_whitespace()) else {
        return hi;
    };
    let lo = lo.max(first_content);
    for separator in separators {
        let sep_len = separator.len();
        if sep_len == 0 || sep_len > hi - start {
            continue;
        }
        // Break position is just after the separator.
        let mut pos = hi;
        while pos > lo && pos >= start + sep_len {
            if chars[pos - sep_len..pos] == separator[..] {
                return pos;
            }
            pos -= 1;
        }
    }
    hi
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = normalize_whitespace(&document.text());
        if text.is_empty() && !document.is_empty() {
            return Err(RagError::InvalidDocument {
                document_id: document.id.clone(),
                message: "document has no textual content".to_string(),
            });
        }
        let chars: Vec<char> = text.chars().collect();

        let mut chunks = Vec::new();
        for (index, (start, end)) in self.spans(&chars).into_iter().enumerate() {
            let chunk_text: String = chars[start..end].iter().collect();
            if chunk_text.trim().is_empty() {
                return Err(RagError::InvalidDocument {
                    document_id: document.id.clone(),
                    message: format!(
                        "chunk {index} (characters {start}..{end}) has no textual content"
                    ),
                });
            }

            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), index.to_string());
            metadata.insert("start".to_string(), start.to_string());
            metadata.insert("end".to_string(), end.to_string());
            if let Some(uri) = &document.source_uri {
                metadata.insert("source_uri".to_string(), uri.clone());
            }

            chunks.push(Chunk {
                id: format!("{}_{index}", document.id),
                index,
                text: chunk_text,
                start,
                end,
                metadata,
                document_id: document.id.clone(),
            });
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "chunked document");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunker: &RecursiveChunker, text: &str) -> Vec<String> {
        chunker.split_text(text).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(matches!(RecursiveChunker::new(0, 0), Err(RagError::ConfigError(_))));
        assert!(matches!(RecursiveChunker::new(10, 10), Err(RagError::ConfigError(_))));
        assert!(RecursiveChunker::new(10, 9).is_ok());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = RecursiveChunker::new(100, 10).unwrap();
        assert_eq!(texts(&chunker, "short text"), vec!["short text"]);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        let chunker = RecursiveChunker::new(100, 10).unwrap();
        assert!(chunker.chunk(&Document::from_text("d", "")).unwrap().is_empty());
    }

    #[test]
    fn sky_sentence_splits_on_words_with_five_char_overlap() {
        let chunker = RecursiveChunker::new(20, 5).unwrap();
        let text = "The sky is blue because of Rayleigh scattering.";
        let chunks = texts(&chunker, text);

        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0], "The sky is blue ");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "chunk too long: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            let chars: Vec<char> = pair[0].chars().collect();
            let tail: String = chars[chars.len() - 5..].iter().collect();
            assert!(pair[1].starts_with(&tail), "{:?} does not start with {:?}", pair[1], tail);
        }
    }

    #[test]
    fn prefers_paragraph_over_sentence_breaks() {
        let chunker = RecursiveChunker::new(40, 0).unwrap();
        let text = "First para. Still first.\n\nSecond paragraph here.";
        let chunks = texts(&chunker, text);
        assert_eq!(chunks[0], "First para. Still first.\n\n");
        assert_eq!(chunks[1], "Second paragraph here.");
    }

    #[test]
    fn falls_back_to_characters_without_separators() {
        let chunker = RecursiveChunker::new(4, 1).unwrap();
        assert_eq!(texts(&chunker, "abcdefghij"), vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn tabs_become_spaces() {
        let chunker = RecursiveChunker::new(50, 0).unwrap();
        assert_eq!(texts(&chunker, "a\tb\tc"), vec!["a b c"]);
    }

    #[test]
    fn whitespace_only_document_is_an_integrity_error() {
        let chunker = RecursiveChunker::new(10, 0).unwrap();
        let doc = Document::from_text("blank", "   \t  ");
        match chunker.chunk(&doc) {
            Err(RagError::InvalidDocument { document_id, .. }) => assert_eq!(document_id, "blank"),
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_run_longer_than_a_chunk_is_an_integrity_error() {
        let chunker = RecursiveChunker::new(4, 0).unwrap();
        let doc = Document::from_text("gap", "ab          cd");
        assert!(matches!(chunker.chunk(&doc), Err(RagError::InvalidDocument { .. })));
    }

    #[test]
    fn trailing_whitespace_does_not_produce_a_blank_chunk() {
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        let chunks = chunker.chunk(&Document::from_text("d", "abcdefgh\n\n\n\n\n\n")).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "abcdefgh");
    }

    #[test]
    fn lone_separator_is_not_a_chunk() {
        // Only separator in the second window sits at its first character.
        let chunker = RecursiveChunker::new(6, 0).unwrap();
        assert_eq!(texts(&chunker, "abcdef ghijklmno"), vec!["abcdef", " ghijk", "lmno"]);
    }

    #[test]
    fn chunks_carry_offsets_and_metadata() {
        let chunker = RecursiveChunker::new(20, 5).unwrap();
        let doc = Document::from_text("doc", "The sky is blue because of Rayleigh scattering.")
            .with_metadata("topic", "physics");
        let chunks = chunker.chunk(&doc).unwrap();

        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[1].start, chunks[0].end - 5);
        assert_eq!(chunks[1].metadata["topic"], "physics");
        assert_eq!(chunks[1].metadata["chunk_index"], "1");
        assert_eq!(chunks.last().unwrap().end, 47);
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let chunker = RecursiveChunker::new(3, 1).unwrap();
        assert_eq!(texts(&chunker, "äöüßé"), vec!["äöü", "üßé"]);
    }
}
