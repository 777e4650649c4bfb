//! Sliding-window text chunking with natural-boundary preference.

use storage::models::Chunk;
use text_splitter::{Characters, ChunkConfig, ChunkConfigError, TextSplitter};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid chunking configuration: {0}")]
pub struct ChunkError(#[from] ChunkConfigError);

/// Splits page text into overlapping windows. The splitter prefers
/// paragraph, then sentence, then word boundaries before falling back to a
/// hard character cut, so chunks end mid-word only when a single word
/// exceeds the window.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        let config = ChunkConfig::new(chunk_size)
            .with_trim(true)
            .with_overlap(chunk_overlap)?;
        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    /// Chunks one page of text. Output order follows text order; `page` is
    /// stamped onto every produced chunk.
    pub fn chunk_page(&self, text: &str, source: &str, page: u32) -> Vec<Chunk> {
        self.splitter
            .chunks(text)
            .filter(|c| !c.trim().is_empty())
            .map(|c| Chunk {
                text: c.to_string(),
                source: source.to_string(),
                page,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new(500, 50).unwrap()
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(Chunker::new(50, 500).is_err());
    }

    #[test]
    fn short_page_is_a_single_chunk() {
        let chunks = chunker().chunk_page("A short paragraph.", "doc.pdf", 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short paragraph.");
        assert_eq!(chunks[0].source, "doc.pdf");
        assert_eq!(chunks[0].page, 1);
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        assert!(chunker().chunk_page("", "doc.pdf", 1).is_empty());
        assert!(chunker().chunk_page("  \n\t ", "doc.pdf", 1).is_empty());
    }

    #[test]
    fn long_page_splits_within_window_at_word_boundaries() {
        let words = ["alpha", "beta", "gamma", "delta"];
        let text = words
            .iter()
            .cycle()
            .take(600)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker().chunk_page(&text, "doc.pdf", 2);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 500, "chunk over window: {}", chunk.text.len());
            // No word may be severed.
            assert!(chunk
                .text
                .split_whitespace()
                .all(|w| words.contains(&w)));
            assert_eq!(chunk.page, 2);
        }
    }

    #[test]
    fn consecutive_chunks_share_overlapping_text() {
        let text = (0..400)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker().chunk_page(&text, "doc.pdf", 1);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let last_word = pair[0]
                .text
                .split_whitespace()
                .last()
                .expect("non-empty chunk");
            assert!(
                pair[1].text.contains(last_word),
                "no overlap between consecutive chunks"
            );
        }
    }
}
