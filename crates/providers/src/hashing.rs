//! Deterministic offline embedder based on feature hashing.
//!
//! Lowercased word tokens are hashed into a fixed number of dimensions with
//! a seeded blake3 hash; each token adds +1 or -1 to its slot and the result
//! is L2-normalized. Identical text always produces an identical vector, and
//! shared vocabulary produces cosine similarity, which is all the index
//! needs from an embedding function. No network, no model files.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            seed: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct HashingProvider {
    cfg: HashingConfig,
}

impl HashingProvider {
    pub fn new(cfg: HashingConfig) -> Self {
        Self { cfg }
    }

    pub fn dimensions(&self) -> usize {
        self.cfg.dimensions
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f32; self.cfg.dimensions];
        for token in tokens(text) {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&self.cfg.seed.to_le_bytes());
            hasher.update(token.as_bytes());
            let digest = *hasher.finalize().as_bytes();
            let slot = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.cfg.dimensions;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            acc[slot] += sign;
        }
        let norm = acc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut acc {
                *v /= norm;
            }
        }
        acc
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }
}
