//! Embedder trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A model that turns text into a fixed-length vector.
///
/// Implementations are deterministic for a fixed model: the same text yields
/// the same vector. Nothing is cached. Whether over-long input is truncated
/// or rejected is up to the implementation and must be documented on it;
/// callers never truncate.
///
/// The output dimension is not declared up front. The index manager learns
/// it by embedding [`SENTINEL_TEXT`](crate::SENTINEL_TEXT) once.
///
/// # Example
///
/// ```rust,ignore
/// use vitt_rag::{Embedder, HashEmbedder};
///
/// let embedder = HashEmbedder::new(384);
/// let vector = embedder.embed("Reliance quarterly profit").await?;
/// assert_eq!(vector.len(), 384);
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the configured model.
    fn model_id(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](Embedder::embed)
    /// sequentially. Override it when the backend batches natively.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// An in-process embedder producing deterministic, L2-normalised vectors
/// seeded from a hash of the text.
///
/// It has no notion of meaning, only of identity: equal texts map to equal
/// vectors and an exact-text query scores 1.0 against its document. Useful
/// for offline runs and tests. Input of any length is accepted; nothing is
/// truncated.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self { dimension, model_id: format!("hash-{dimension}") }
    }

    /// Parse a model id of the form `hash-<dimension>`.
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        model_id
            .strip_prefix("hash-")
            .and_then(|dim| dim.parse::<usize>().ok())
            .filter(|dim| *dim > 0)
            .map(Self::new)
            .ok_or_else(|| RagError::EmbeddingError {
                provider: "hash".into(),
                message: format!("unrecognised model id '{model_id}', expected hash-<dimension>"),
            })
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = text.bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });
        let mut state = hash;
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|_| {
                // splitmix64
                state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
                let mut z = state;
                z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
                z ^= z >> 31;
                (z >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0
            })
            .collect();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}
