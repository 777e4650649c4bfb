//! Content fingerprinting and document folder scanning.

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io::Read;
use std::path::Path;
use storage::models::{DocumentFingerprint, Manifest};
use tracing::debug;
use walkdir::WalkDir;

/// Hashes the full file content in fixed-size blocks. The digest depends on
/// the bytes alone; mtime is carried separately and never affects identity.
pub fn fingerprint(path: &Path) -> anyhow::Result<DocumentFingerprint> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let meta = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    Ok(DocumentFingerprint {
        hash: hasher.finalize().to_hex().to_string(),
        mtime,
    })
}

/// Scans one directory level for indexable documents and fingerprints each,
/// enumerated sorted by file name. Hidden files and exclude-glob matches are
/// skipped; a missing folder reads as an empty corpus.
pub fn scan_folder(
    folder: &Path,
    extensions: &[String],
    excludes: &[String],
) -> anyhow::Result<Manifest> {
    let exclude_set = build_globset(excludes)?;
    let mut manifest = Manifest::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if entry.file_type().is_dir() || is_hidden(path) || exclude_set.is_match(path) {
            continue;
        }
        if !has_extension(path, extensions) {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let fp = fingerprint(path)?;
        manifest.insert(name, fp);
    }

    debug!(folder = %folder.display(), documents = manifest.len(), "scanned document folder");
    Ok(manifest)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            extensions.iter().any(|want| want.eq_ignore_ascii_case(&e))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["pdf".to_string(), "txt".to_string()]
    }

    #[test]
    fn hash_depends_on_content_only() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "same bytes").unwrap();
        std::fs::write(&b, "same bytes").unwrap();

        let fa = fingerprint(&a).unwrap();
        let fb = fingerprint(&b).unwrap();
        assert_eq!(fa.hash, fb.hash);

        std::fs::write(&b, "different bytes").unwrap();
        let fb = fingerprint(&b).unwrap();
        assert_ne!(fa.hash, fb.hash);
    }

    #[test]
    fn rewriting_identical_bytes_keeps_the_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "stable content").unwrap();
        let before = fingerprint(&path).unwrap();

        // Touch the file without changing content; only mtime may move.
        std::fs::write(&path, "stable content").unwrap();
        let after = fingerprint(&path).unwrap();
        assert_eq!(before.hash, after.hash);
    }

    #[test]
    fn scan_filters_by_extension_and_skips_hidden() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();
        std::fs::write(dir.path().join("keep.pdf"), "y").unwrap();
        std::fs::write(dir.path().join("skip.log"), "z").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "h").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("nested.txt"), "n").unwrap();

        let manifest = scan_folder(dir.path(), &exts(), &[]).unwrap();
        let names: Vec<&String> = manifest.keys().collect();
        assert_eq!(names, vec!["keep.pdf", "keep.txt"]);
    }

    #[test]
    fn scan_applies_exclude_globs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();
        std::fs::write(dir.path().join("draft-notes.txt"), "y").unwrap();

        let manifest =
            scan_folder(dir.path(), &exts(), &["**/draft-*".to_string()]).unwrap();
        assert!(manifest.contains_key("keep.txt"));
        assert!(!manifest.contains_key("draft-notes.txt"));
    }

    #[test]
    fn scan_of_missing_folder_is_empty() {
        let dir = tempdir().unwrap();
        let manifest = scan_folder(&dir.path().join("nope"), &exts(), &[]).unwrap();
        assert!(manifest.is_empty());
    }
}
