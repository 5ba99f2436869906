//! Retriever: the query-side view of the vector store.

use std::sync::Arc;

use ragline_core::models::Chunk;
use ragline_core::store::MetadataFilter;
use ragline_core::Result;

use crate::vector_store::VectorStoreManager;

/// Forwards queries to the store with a fixed `k`. No re-ranking.
pub struct Retriever {
    store: Arc<VectorStoreManager>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<VectorStoreManager>, k: usize) -> Self {
        Self { store, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Most relevant chunks first. An empty result is not an error.
    pub async fn retrieve(&self, query: &str, filter: Option<&MetadataFilter>) -> Result<Vec<Chunk>> {
        let hits = self.store.search(query, self.k, filter).await?;
        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }
}
