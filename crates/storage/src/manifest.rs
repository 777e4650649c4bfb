//! Persistence for the document manifest.

use crate::models::Manifest;
use crate::StoreError;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Loads and saves the manifest JSON next to the index artifacts.
///
/// A missing or unreadable manifest is not an error: it reads as empty,
/// which pushes the reconciler onto the full-rebuild path.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Manifest {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Manifest::new(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "manifest unreadable, treating as empty"
                );
                Manifest::new()
            }
        }
    }

    /// Atomically replaces the manifest on disk. Pretty-printed so operators
    /// can inspect and edit it by hand.
    pub fn save(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(manifest)?;
        crate::replace_file(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentFingerprint;
    use tempfile::tempdir;

    fn fingerprint(hash: &str) -> DocumentFingerprint {
        DocumentFingerprint {
            hash: hash.to_string(),
            mtime: 1_700_000_000,
        }
    }

    #[test]
    fn missing_manifest_loads_empty() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_manifest_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = ManifestStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let mut manifest = Manifest::new();
        manifest.insert("syllabus.pdf".to_string(), fingerprint("abc123"));
        manifest.insert("handbook.pdf".to_string(), fingerprint("def456"));
        store.save(&manifest).unwrap();

        assert_eq!(store.load(), manifest);
    }

    #[test]
    fn on_disk_format_is_hash_and_mtime_keyed_by_name() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let mut manifest = Manifest::new();
        manifest.insert("syllabus.pdf".to_string(), fingerprint("abc123"));
        store.save(&manifest).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["syllabus.pdf"]["hash"], "abc123");
        assert_eq!(value["syllabus.pdf"]["mtime"], 1_700_000_000);
        // Pretty-printed for human inspection.
        assert!(raw.contains('\n'));
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let mut first = Manifest::new();
        first.insert("a.pdf".to_string(), fingerprint("one"));
        store.save(&first).unwrap();

        let mut second = Manifest::new();
        second.insert("b.pdf".to_string(), fingerprint("two"));
        store.save(&second).unwrap();

        assert_eq!(store.load(), second);
    }
}
