//! The persisted index artifact pair.
//!
//! An index on disk is two files inside the index directory: `vectors.bin`
//! (embedding dimension plus the dense vector matrix) and `chunks.bin` (the
//! chunk docstore, row-aligned with the matrix). The pair is only meaningful
//! together; `is_complete` is the startup integrity check.

use crate::models::Chunk;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.bin";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Embedding matrix persisted alongside the chunk store. Row `i` of
/// `vectors` embeds chunk `i` of the docstore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorData {
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
}

/// Paths of the artifact pair for one index directory.
#[derive(Debug, Clone)]
pub struct IndexArtifacts {
    dir: PathBuf,
}

impl IndexArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.dir.join(CHUNKS_FILE)
    }

    /// The manifest lives in the same directory as the artifacts it tracks.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Both files must be present for the index to be considered loadable.
    pub fn is_complete(&self) -> bool {
        self.vectors_path().exists() && self.chunks_path().exists()
    }

    pub fn read_vectors(&self) -> Result<VectorData, StoreError> {
        read_bincode(&self.vectors_path())
    }

    pub fn write_vectors(&self, data: &VectorData) -> Result<(), StoreError> {
        write_bincode(&self.vectors_path(), data)
    }

    pub fn read_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        read_bincode(&self.chunks_path())
    }

    pub fn write_chunks(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        write_bincode(&self.chunks_path(), &chunks)
    }
}

fn read_bincode<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize(&bytes).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = bincode::serialize(value)?;
    crate::replace_file(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            page: 1,
        }
    }

    #[test]
    fn incomplete_until_both_files_exist() {
        let dir = tempdir().unwrap();
        let artifacts = IndexArtifacts::new(dir.path());
        assert!(!artifacts.is_complete());

        artifacts
            .write_vectors(&VectorData {
                dimension: 2,
                vectors: vec![vec![0.0, 1.0]],
            })
            .unwrap();
        assert!(!artifacts.is_complete());

        artifacts.write_chunks(&[chunk("hello")]).unwrap();
        assert!(artifacts.is_complete());
    }

    #[test]
    fn vectors_round_trip() {
        let dir = tempdir().unwrap();
        let artifacts = IndexArtifacts::new(dir.path());
        let data = VectorData {
            dimension: 3,
            vectors: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.5, 0.5]],
        };
        artifacts.write_vectors(&data).unwrap();
        let loaded = artifacts.read_vectors().unwrap();
        assert_eq!(loaded.dimension, 3);
        assert_eq!(loaded.vectors, data.vectors);
    }

    #[test]
    fn chunks_round_trip() {
        let dir = tempdir().unwrap();
        let artifacts = IndexArtifacts::new(dir.path());
        let chunks = vec![chunk("first"), chunk("second")];
        artifacts.write_chunks(&chunks).unwrap();
        assert_eq!(artifacts.read_chunks().unwrap(), chunks);
    }

    #[test]
    fn read_missing_artifact_is_an_error() {
        let dir = tempdir().unwrap();
        let artifacts = IndexArtifacts::new(dir.path());
        assert!(matches!(
            artifacts.read_vectors(),
            Err(StoreError::Read { .. })
        ));
    }

    #[test]
    fn read_garbage_artifact_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let artifacts = IndexArtifacts::new(dir.path());
        std::fs::write(artifacts.chunks_path(), b"\xff\xff\xff\xff\xff").unwrap();
        assert!(matches!(
            artifacts.read_chunks(),
            Err(StoreError::Decode { .. })
        ));
    }
}
