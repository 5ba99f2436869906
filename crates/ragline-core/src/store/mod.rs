//! Vector engine abstraction for ragline.
//!
//! A [`VectorEngine`] is bound to one persisted location and hands out
//! [`VectorCollection`] handles: either a freshly created collection or one
//! opened from disk. The vector store manager in the app crate owns the
//! lifecycle; engines only store, rank, and delete.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create`](VectorEngine::create) | Create the collection from a first batch |
//! | [`open`](VectorEngine::open) | Bind to an existing collection, if any |
//! | [`add`](VectorCollection::add) | Append embedded chunks |
//! | [`search`](VectorCollection::search) | Filtered top-k cosine search |
//! | [`persist`](VectorCollection::persist) | Flush pending writes |
//! | [`delete_collection`](VectorCollection::delete_collection) | Drop everything |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::{Chunk, ChunkMetadata};

/// Identity of the embedding space a collection was created in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub model: String,
    pub dims: usize,
}

/// A chunk paired with its embedding, ready to be written.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One search result, with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Exact-match conjunction over chunk metadata fields.
///
/// A chunk matches when every key is present in its metadata with an equal
/// value. An empty filter matches everything.
///
/// ```rust
/// use ragline_core::store::MetadataFilter;
///
/// let filter = MetadataFilter::new().with("source", "a.txt");
/// assert_eq!(filter.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(BTreeMap<String, Value>);

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.get(key).as_ref() == Some(expected))
    }
}

impl FromIterator<(String, Value)> for MetadataFilter {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Engine bound to a single persisted location.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// Human-readable location (path or name) for logs.
    fn location(&self) -> String;

    /// Create the collection and write the first batch.
    async fn create(
        &self,
        spec: &CollectionSpec,
        records: &[EmbeddedChunk],
    ) -> Result<Arc<dyn VectorCollection>>;

    /// Bind to the persisted collection, or `None` if there is none.
    async fn open(&self) -> Result<Option<Arc<dyn VectorCollection>>>;
}

/// Handle to a live, persisted collection.
///
/// Another handle on the same location may delete the collection. Once that
/// happens `add`, `search`, and `count` fail with
/// [`Error::StoreNotInitialized`](crate::error::Error::StoreNotInitialized)
/// so the owner can drop the stale handle.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    fn spec(&self) -> &CollectionSpec;

    async fn add(&self, records: &[EmbeddedChunk]) -> Result<()>;

    /// Top-`k` chunks by descending cosine similarity, restricted to those
    /// matching `filter`. Ties keep insertion order.
    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>>;

    async fn persist(&self) -> Result<()>;

    async fn delete_collection(&self) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

/// SHA-256 of a chunk's text, stored alongside each record.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Brute-force ranking shared by the bundled engines.
///
/// Filters, scores, and stably sorts `(chunk, vector)` pairs given in
/// insertion order, so equal scores keep that order.
pub fn rank<'a, I>(
    candidates: I,
    query_vec: &[f32],
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (&'a Chunk, &'a [f32])>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .filter(|(chunk, _)| filter.map_or(true, |f| f.matches(&chunk.metadata)))
        .map(|(chunk, vector)| SearchHit {
            chunk: chunk.clone(),
            score: cosine_similarity(query_vec, vector),
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn chunk(source: &str, chunk_id: usize) -> Chunk {
        Chunk {
            content: format!("{} #{}", source, chunk_id),
            metadata: ChunkMetadata {
                source: source.to_string(),
                title: source.to_string(),
                created_at: "2024-01-01T00:00:00+00:00".to_string(),
                doc_id: 0,
                chunk_id,
                extra: Map::new(),
            },
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(MetadataFilter::new().matches(&chunk("a.txt", 0).metadata));
    }

    #[test]
    fn filter_is_conjunction() {
        let meta = chunk("a.txt", 3).metadata;
        assert!(MetadataFilter::new().with("source", "a.txt").matches(&meta));
        assert!(MetadataFilter::new()
            .with("source", "a.txt")
            .with("chunk_id", 3)
            .matches(&meta));
        assert!(!MetadataFilter::new()
            .with("source", "a.txt")
            .with("chunk_id", 4)
            .matches(&meta));
        assert!(!MetadataFilter::new().with("page", 1).matches(&meta));
    }

    #[test]
    fn filter_deserializes_from_json_object() {
        let filter: MetadataFilter = serde_json::from_value(json!({"source": "a.txt"})).unwrap();
        assert!(filter.matches(&chunk("a.txt", 0).metadata));
        assert!(!filter.matches(&chunk("b.txt", 0).metadata));
    }

    #[test]
    fn rank_orders_by_similarity_and_truncates() {
        let a = chunk("a.txt", 0);
        let b = chunk("b.txt", 1);
        let c = chunk("c.txt", 2);
        let va = vec![1.0, 0.0];
        let vb = vec![0.0, 1.0];
        let vc = vec![0.7, 0.7];
        let candidates = vec![
            (&a, va.as_slice()),
            (&b, vb.as_slice()),
            (&c, vc.as_slice()),
        ];
        let hits = rank(candidates, &[0.0, 1.0], 2, None);
        let sources: Vec<&str> = hits.iter().map(|h| h.chunk.metadata.source.as_str()).collect();
        assert_eq!(sources, vec!["b.txt", "c.txt"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn rank_ties_keep_insertion_order() {
        let a = chunk("a.txt", 0);
        let b = chunk("b.txt", 1);
        let v = vec![1.0, 1.0];
        let hits = rank(vec![(&a, v.as_slice()), (&b, v.as_slice())], &[1.0, 1.0], 5, None);
        assert_eq!(hits[0].chunk.metadata.chunk_id, 0);
        assert_eq!(hits[1].chunk.metadata.chunk_id, 1);
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
