//! Index reconciliation: diff the document folder against the manifest and
//! bring the persisted index up to date.
//!
//! The index has no per-document removal primitive, so a removed or modified
//! document can only be reflected by rebuilding the whole index; the same
//! path doubles as recovery from missing artifacts. Only the appearance of
//! brand-new documents takes the cheap append path.

use crate::chunker::Chunker;
use crate::config::AppConfig;
use crate::fingerprint;
use crate::index::EmbeddingIndex;
use crate::loader;
use anyhow::Context;
use providers::hashing::{HashingConfig, HashingProvider};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::path::Path;
use std::sync::Arc;
use storage::artifacts::IndexArtifacts;
use storage::manifest::ManifestStore;
use storage::models::Manifest;
use tracing::info;

/// Which maintenance path a reconciliation pass took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    FullRebuild,
    IncrementalAdd,
    NoChange,
}

impl ReconcileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileMode::FullRebuild => "full-rebuild",
            ReconcileMode::IncrementalAdd => "incremental-add",
            ReconcileMode::NoChange => "no-change",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileSummary {
    pub mode: ReconcileMode,
    pub documents: usize,
    pub new_documents: Vec<String>,
    pub removed_documents: Vec<String>,
    pub modified_documents: Vec<String>,
    /// Chunks embedded during this pass (zero on the no-change path).
    pub embedded_chunks: usize,
}

pub struct ReconcileOutcome {
    pub index: EmbeddingIndex,
    pub summary: ReconcileSummary,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestDiff {
    pub new: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Diffs the scanned folder state against the previously persisted manifest.
/// Hash equality decides modification; mtime never does.
pub fn diff_manifests(current: &Manifest, previous: &Manifest) -> ManifestDiff {
    let mut diff = ManifestDiff::default();
    for (name, fp) in current {
        match previous.get(name) {
            None => diff.new.push(name.clone()),
            Some(prev) if prev.hash != fp.hash => diff.modified.push(name.clone()),
            Some(_) => {}
        }
    }
    for name in previous.keys() {
        if !current.contains_key(name) {
            diff.removed.push(name.clone());
        }
    }
    diff
}

/// Brings the on-disk index and manifest up to date with the document
/// folder and returns the queryable index. Runs once at startup, before
/// any queries are served.
pub async fn reconcile(
    cfg: &AppConfig,
    registry: &ProviderRegistry,
) -> anyhow::Result<ReconcileOutcome> {
    let folder = Path::new(&cfg.documents.folder);
    let artifacts = IndexArtifacts::new(&cfg.index.path);
    std::fs::create_dir_all(artifacts.dir())
        .with_context(|| format!("failed to create index directory {}", cfg.index.path))?;
    let store = ManifestStore::new(artifacts.manifest_path());

    let embedder = registry.embedding(Some(&cfg.embeddings.provider))?;
    let chunker = Chunker::new(cfg.chunking.chunk_size, cfg.chunking.chunk_overlap)?;

    let current = fingerprint::scan_folder(folder, &cfg.documents.extensions, &cfg.documents.exclude)
        .context("failed to scan document folder")?;
    let previous = store.load();
    let diff = diff_manifests(&current, &previous);

    let needs_rebuild =
        !artifacts.is_complete() || !diff.removed.is_empty() || !diff.modified.is_empty();

    let (index, mode, embedded_chunks) = if needs_rebuild {
        info!(
            new = diff.new.len(),
            removed = diff.removed.len(),
            modified = diff.modified.len(),
            index_present = artifacts.is_complete(),
            "rebuilding embedding index from scratch"
        );
        let names: Vec<String> = current.keys().cloned().collect();
        let chunks = loader::load_and_chunk(folder, &names, &chunker)
            .context("failed to load documents for rebuild")?;
        info!(documents = names.len(), chunks = chunks.len(), "corpus chunked, embedding");

        let count = chunks.len();
        let index = EmbeddingIndex::build_from(
            chunks,
            embedder,
            cfg.embeddings.dimensions,
            cfg.embeddings.batch_size,
        )
        .await?;
        // Index first, manifest second: a crash in between leaves a stale
        // manifest next to fresh artifacts, which the next pass repairs by
        // rebuilding.
        index.save(&artifacts)?;
        store.save(&current)?;
        (index, ReconcileMode::FullRebuild, count)
    } else if !diff.new.is_empty() {
        info!(count = diff.new.len(), documents = ?diff.new, "adding new documents to existing index");
        let mut index =
            EmbeddingIndex::load(&artifacts, embedder, cfg.embeddings.batch_size)?;
        let chunks = loader::load_and_chunk(folder, &diff.new, &chunker)
            .context("failed to load new documents")?;
        let count = chunks.len();
        index.add_chunks(chunks).await?;
        index.save(&artifacts)?;

        // Merge the new fingerprints into the manifest that is already on
        // disk; unchanged entries keep their recorded values untouched.
        let mut manifest = previous;
        for name in &diff.new {
            if let Some(fp) = current.get(name) {
                manifest.insert(name.clone(), fp.clone());
            }
        }
        store.save(&manifest)?;
        (index, ReconcileMode::IncrementalAdd, count)
    } else {
        info!("no document changes detected, loading existing index");
        let index = EmbeddingIndex::load(&artifacts, embedder, cfg.embeddings.batch_size)?;
        (index, ReconcileMode::NoChange, 0)
    };

    Ok(ReconcileOutcome {
        index,
        summary: ReconcileSummary {
            mode,
            documents: current.len(),
            new_documents: diff.new,
            removed_documents: diff.removed,
            modified_documents: diff.modified,
            embedded_chunks,
        },
    })
}

/// Builds the provider registry from configuration: the deterministic
/// hashing embedder is always available; an OpenAI-compatible backend is
/// registered when credentials are present in the environment.
pub fn build_registry(cfg: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_embedding(
        "hashing",
        Arc::new(HashingProvider::new(HashingConfig {
            dimensions: cfg.embeddings.dimensions,
            seed: cfg.embeddings.seed,
        })),
    );

    if let (Some(key), Some(base)) = (
        std::env::var_os("OPENAI_API_KEY"),
        std::env::var_os("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base.to_string_lossy().into_owned(),
            embedding_model: cfg.embeddings.model.clone(),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    reg.set_preferred_embedding(&cfg.embeddings.provider)
}
