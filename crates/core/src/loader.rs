//! Document loading: per-page text extraction feeding the chunker.

use crate::chunker::Chunker;
use std::fs;
use std::path::Path;
use storage::models::Chunk;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {name}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {name}")]
    Parse {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("unsupported document type: {name}")]
    Unsupported { name: String },
}

/// Extracts the text of each page, in page order. Text files count as a
/// single page. A document that cannot be parsed fails the whole pass; it
/// is never silently skipped.
pub fn extract_pages(path: &Path) -> Result<Vec<String>, LoadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => pdf_pages(path, &name),
        "txt" | "md" => {
            let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
                name: name.clone(),
                source,
            })?;
            Ok(vec![text])
        }
        _ => Err(LoadError::Unsupported { name }),
    }
}

#[cfg(feature = "pdf")]
fn pdf_pages(path: &Path, name: &str) -> Result<Vec<String>, LoadError> {
    pdf_extract::extract_text_by_pages(path).map_err(|e| LoadError::Parse {
        name: name.to_string(),
        source: anyhow::Error::new(e),
    })
}

#[cfg(not(feature = "pdf"))]
fn pdf_pages(_path: &Path, name: &str) -> Result<Vec<String>, LoadError> {
    Err(LoadError::Unsupported {
        name: name.to_string(),
    })
}

/// Loads and chunks the named documents. Chunk order is stable: documents
/// in input order, pages in document order, chunks in page order.
pub fn load_and_chunk(
    folder: &Path,
    names: &[String],
    chunker: &Chunker,
) -> Result<Vec<Chunk>, LoadError> {
    let mut chunks = Vec::new();
    for name in names {
        let path = folder.join(name);
        let pages = extract_pages(&path)?;
        debug!(doc = %name, pages = pages.len(), "extracted document");
        for (i, page) in pages.iter().enumerate() {
            chunks.extend(chunker.chunk_page(page, name, (i + 1) as u32));
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn text_file_is_one_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "line one\nline two").unwrap();
        let pages = extract_pages(&path).unwrap();
        assert_eq!(pages, vec!["line one\nline two".to_string()]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "a,b").unwrap();
        assert!(matches!(
            extract_pages(&path),
            Err(LoadError::Unsupported { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            extract_pages(&dir.path().join("gone.txt")),
            Err(LoadError::Read { .. })
        ));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn corrupt_pdf_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(
            extract_pages(&path),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn chunk_order_follows_input_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "content of b").unwrap();
        fs::write(dir.path().join("a.txt"), "content of a").unwrap();
        let chunker = Chunker::new(500, 50).unwrap();

        let names = vec!["b.txt".to_string(), "a.txt".to_string()];
        let chunks = load_and_chunk(dir.path(), &names, &chunker).unwrap();
        let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn failing_document_fails_the_whole_pass() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), "fine").unwrap();
        let chunker = Chunker::new(500, 50).unwrap();

        let names = vec!["ok.txt".to_string(), "missing.txt".to_string()];
        assert!(load_and_chunk(dir.path(), &names, &chunker).is_err());
    }
}
