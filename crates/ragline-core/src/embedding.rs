//! Embedding and generation provider traits, plus vector utilities.
//!
//! Defines the [`EmbeddingProvider`] and [`CompletionProvider`] traits that
//! all model backends implement, plus pure helper functions for vector
//! serialization and similarity computation.
//!
//! Concrete providers (OpenAI, Ollama) live in the `ragline` app crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for embedding providers.
///
/// A persisted collection is bound to one `(model_name, dims)` pair for its
/// whole lifetime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("empty embedding response".to_string()))
    }
}

/// Trait for generative model providers: one blocking prompt → text call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Vector BLOB encoding: little-endian `f32`s, four bytes each.
///
/// ```rust
/// use ragline_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![0.5f32, -4.0, 2.25];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]. Trailing bytes that do not form a whole
/// `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .filter_map(|bytes| bytes.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Mismatched lengths, empty input and zero-norm vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, aa, bb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, aa, bb), (x, y)| {
            (dot + x * y, aa + x * x, bb + y * y)
        });
    let norm = (aa * bb).sqrt();
    if norm < f32::EPSILON {
        0.0
    } else {
        dot / norm
    }
}
