//! Context retrieval for the downstream answering layer.

use crate::index::{EmbeddingIndex, IndexError};

/// Searches the index and joins the nearest chunks' text with newlines,
/// nearest first. This is the one entry point the chat layer calls; an
/// empty index yields an empty string.
pub async fn retrieve_relevant_context(
    index: &EmbeddingIndex,
    query: &str,
    k: usize,
) -> Result<String, IndexError> {
    let hits = index.search(query, k).await?;
    Ok(hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}
