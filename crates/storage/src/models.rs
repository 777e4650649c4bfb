use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content identity for a source document.
///
/// `hash` is a blake3 digest of the full file bytes; two fingerprints with
/// equal hashes are the same content no matter what `mtime` says. `mtime`
/// (seconds since epoch) is recorded for operators reading the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub hash: String,
    pub mtime: i64,
}

/// The set of documents currently reflected in the embedding index, keyed by
/// file name. Persisted as a single JSON object; BTreeMap keeps enumeration
/// and serialization order deterministic.
pub type Manifest = BTreeMap<String, DocumentFingerprint>;

/// A bounded span of extracted document text, the unit that gets embedded
/// and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// File name of the document this chunk came from.
    pub source: String,
    /// 1-based page number within the source document.
    pub page: u32,
}
