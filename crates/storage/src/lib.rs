//! Storage layer: manifest store and persisted index artifacts.
//!
//! Everything the indexer keeps on disk lives here: the human-readable
//! manifest tracking which documents the index reflects, and the opaque
//! artifact pair holding the index itself.

pub mod artifacts;
pub mod manifest;
pub mod models;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to encode index artifact")]
    Encode(#[from] bincode::Error),
    #[error("failed to encode manifest")]
    EncodeManifest(#[from] serde_json::Error),
}

/// Writes `bytes` to a temp sibling of `path`, then renames it into place.
/// Readers never observe a half-written file; last save wins.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
