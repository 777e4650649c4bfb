//! The embedding index: chunks, their vectors, and an in-memory HNSW graph.
//!
//! The graph itself is never serialized. Persistence is the artifact pair
//! (vector matrix + chunk docstore); at load time the graph is rebuilt by
//! re-inserting the stored vectors in order, which is deterministic. Entries
//! are only ever appended; removal and update happen by rebuilding from
//! scratch with the offending documents omitted.

use hnsw::{Hnsw, Searcher};
use providers::{EmbeddingProvider, ProviderError};
use space::{Metric, Neighbor};
use std::sync::Arc;
use storage::artifacts::{IndexArtifacts, VectorData};
use storage::models::Chunk;
use storage::StoreError;
use thiserror::Error;
use tracing::{debug, info};

/// Floor for the HNSW ef_search parameter; below this recall degrades on
/// small result counts.
const MIN_EF_SEARCH: usize = 50;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to load index")]
    Load(#[source] StoreError),
    #[error("index artifacts are inconsistent: {0}")]
    Corrupt(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Embedding(#[from] ProviderError),
    #[error("failed to persist index")]
    Persist(#[source] StoreError),
}

/// Cosine distance scaled into u32, which is what the HNSW graph orders by.
struct CosineDistance;

impl Metric<Box<[f32]>> for CosineDistance {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

        if mag_a == 0.0 || mag_b == 0.0 {
            return u32::MAX;
        }

        // Cosine distance lands in [0, 2]; scale to the u32 range.
        let distance = 1.0 - dot / (mag_a * mag_b);
        (distance * (u32::MAX as f32 / 2.0)) as u32
    }
}

/// A search result: the chunk plus its similarity to the query in [0, 1].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

pub struct EmbeddingIndex {
    graph: Hnsw<CosineDistance, Box<[f32]>, rand::rngs::StdRng, 16, 32>,
    chunks: Vec<Chunk>,
    vectors: VectorData,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingIndex {
    fn new_empty(embedder: Arc<dyn EmbeddingProvider>, dimension: usize, batch_size: usize) -> Self {
        Self {
            graph: Hnsw::new(CosineDistance),
            chunks: Vec::new(),
            vectors: VectorData {
                dimension,
                vectors: Vec::new(),
            },
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Embeds every chunk and constructs a fresh index. Building from a new
    /// chunk set is the only way previously indexed content goes away.
    pub async fn build_from(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new_empty(embedder, dimension, batch_size);
        index.append(chunks).await?;
        info!(chunks = index.len(), "built embedding index");
        Ok(index)
    }

    /// Restores an index from its artifact pair, rebuilding the graph from
    /// the stored vectors.
    pub fn load(
        artifacts: &IndexArtifacts,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        let vectors = artifacts.read_vectors().map_err(IndexError::Load)?;
        let chunks = artifacts.read_chunks().map_err(IndexError::Load)?;
        if chunks.len() != vectors.vectors.len() {
            return Err(IndexError::Corrupt(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.vectors.len()
            )));
        }

        let mut graph = Hnsw::new(CosineDistance);
        let mut searcher: Searcher<u32> = Searcher::default();
        for vector in &vectors.vectors {
            if vector.len() != vectors.dimension {
                return Err(IndexError::Corrupt(format!(
                    "stored vector has {} dimensions, expected {}",
                    vector.len(),
                    vectors.dimension
                )));
            }
            graph.insert(vector.clone().into_boxed_slice(), &mut searcher);
        }

        debug!(chunks = chunks.len(), dimension = vectors.dimension, "loaded embedding index");
        Ok(Self {
            graph,
            chunks,
            vectors,
            embedder,
            batch_size: batch_size.max(1),
        })
    }

    /// Embeds and appends new chunks in place. Existing entries are never
    /// touched or re-embedded.
    pub async fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        let added = chunks.len();
        self.append(chunks).await?;
        info!(added, total = self.len(), "appended chunks to embedding index");
        Ok(())
    }

    async fn append(&mut self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = self.embed_texts(&texts).await?;

        let mut searcher: Searcher<u32> = Searcher::default();
        for (chunk, vector) in chunks.into_iter().zip(embedded) {
            self.graph
                .insert(vector.clone().into_boxed_slice(), &mut searcher);
            self.vectors.vectors.push(vector);
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Persists the artifact pair, overwriting any prior state.
    pub fn save(&self, artifacts: &IndexArtifacts) -> Result<(), IndexError> {
        artifacts
            .write_vectors(&self.vectors)
            .map_err(IndexError::Persist)?;
        artifacts
            .write_chunks(&self.chunks)
            .map_err(IndexError::Persist)?;
        Ok(())
    }

    /// Embeds the query with the same provider used at index time and
    /// returns up to `k` nearest chunks, nearest first. Stable for repeated
    /// queries against an unchanged index.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embedded = self.embed_texts(&[query.to_string()]).await?;
        let query_vector = embedded
            .into_iter()
            .next()
            .ok_or(ProviderError::ShapeMismatch { want: 1, got: 0 })?;
        let query_box = query_vector.into_boxed_slice();

        let actual_k = k.min(self.chunks.len());
        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: !0
            };
            actual_k
        ];
        let ef_search = std::cmp::max(k * 2, MIN_EF_SEARCH);

        // A fresh searcher per query keeps `search` shared-reference safe
        // for concurrent readers.
        let mut searcher: Searcher<u32> = Searcher::default();
        self.graph
            .nearest(&query_box, ef_search, &mut searcher, &mut neighbors);

        Ok(neighbors
            .into_iter()
            .filter(|n| n.index != !0)
            .map(|n| {
                let distance = (n.distance as f32) / (u32::MAX as f32 / 2.0);
                SearchHit {
                    chunk: self.chunks[n.index].clone(),
                    score: (1.0 - distance).clamp(0.0, 1.0),
                }
            })
            .collect())
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let resp = self.embedder.embed(batch).await?;
            if resp.vectors.len() != batch.len() {
                return Err(ProviderError::ShapeMismatch {
                    want: batch.len(),
                    got: resp.vectors.len(),
                }
                .into());
            }
            for vector in resp.vectors {
                if vector.len() != self.vectors.dimension {
                    return Err(IndexError::DimensionMismatch {
                        expected: self.vectors.dimension,
                        actual: vector.len(),
                    });
                }
                out.push(vector);
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension
    }
}
