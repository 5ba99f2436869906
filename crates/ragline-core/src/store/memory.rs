//! In-memory [`VectorEngine`] for tests and embedding hosts.
//!
//! The "persisted" collection lives in an `Arc<RwLock<..>>` shared by every
//! clone of the engine, so a clone behaves like a second process pointed at
//! the same location. Search is brute-force cosine similarity.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Chunk;

use super::{
    rank, CollectionSpec, EmbeddedChunk, MetadataFilter, SearchHit,
    VectorCollection, VectorEngine,
};

struct StoredRecord {
    chunk: Chunk,
    vector: Vec<f32>,
}

struct Shelf {
    spec: CollectionSpec,
    records: Vec<StoredRecord>,
}

type SharedShelf = Arc<RwLock<Option<Shelf>>>;

fn read(shelf: &SharedShelf) -> Result<RwLockReadGuard<'_, Option<Shelf>>> {
    shelf
        .read()
        .map_err(|_| Error::storage("in-memory collection lock poisoned"))
}

fn write(shelf: &SharedShelf) -> Result<RwLockWriteGuard<'_, Option<Shelf>>> {
    shelf
        .write()
        .map_err(|_| Error::storage("in-memory collection lock poisoned"))
}

fn gone() -> Error {
    Error::StoreNotInitialized
}

fn to_records(records: &[EmbeddedChunk]) -> Vec<StoredRecord> {
    records
        .iter()
        .map(|r| StoredRecord {
            chunk: r.chunk.clone(),
            vector: r.vector.clone(),
        })
        .collect()
}

/// In-memory engine. Clones share the same collection.
#[derive(Clone)]
pub struct InMemoryEngine {
    name: String,
    shelf: SharedShelf,
}

impl InMemoryEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shelf: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl VectorEngine for InMemoryEngine {
    fn location(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn create(
        &self,
        spec: &CollectionSpec,
        records: &[EmbeddedChunk],
    ) -> Result<Arc<dyn VectorCollection>> {
        let mut guard = write(&self.shelf)?;
        match guard.as_mut() {
            Some(existing) if existing.spec != *spec => {
                return Err(Error::Configuration(format!(
                    "collection {} already exists for model {} ({} dims)",
                    self.location(),
                    existing.spec.model,
                    existing.spec.dims
                )))
            }
            Some(existing) => existing.records.extend(to_records(records)),
            None => {
                *guard = Some(Shelf {
                    spec: spec.clone(),
                    records: to_records(records),
                })
            }
        }
        Ok(Arc::new(InMemoryCollection {
            spec: spec.clone(),
            shelf: self.shelf.clone(),
        }))
    }

    async fn open(&self) -> Result<Option<Arc<dyn VectorCollection>>> {
        let guard = read(&self.shelf)?;
        Ok(guard.as_ref().map(|shelf| {
            Arc::new(InMemoryCollection {
                spec: shelf.spec.clone(),
                shelf: self.shelf.clone(),
            }) as Arc<dyn VectorCollection>
        }))
    }
}

struct InMemoryCollection {
    spec: CollectionSpec,
    shelf: SharedShelf,
}

#[async_trait]
impl VectorCollection for InMemoryCollection {
    fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn add(&self, records: &[EmbeddedChunk]) -> Result<()> {
        let mut guard = write(&self.shelf)?;
        let shelf = guard.as_mut().ok_or_else(gone)?;
        shelf.records.extend(to_records(records));
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        let guard = read(&self.shelf)?;
        let shelf = guard.as_ref().ok_or_else(gone)?;
        let candidates = shelf
            .records
            .iter()
            .map(|r| (&r.chunk, r.vector.as_slice()));
        Ok(rank(candidates, query_vec, k, filter))
    }

    async fn persist(&self) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        *write(&self.shelf)? = None;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let guard = read(&self.shelf)?;
        Ok(guard.as_ref().ok_or_else(gone)?.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use serde_json::Map;

    fn record(source: &str, chunk_id: usize, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                content: format!("text of {}", source),
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    title: source.to_string(),
                    created_at: "2024-01-01T00:00:00+00:00".to_string(),
                    doc_id: 0,
                    chunk_id,
                    extra: Map::new(),
                },
            },
            vector,
        }
    }

    fn spec() -> CollectionSpec {
        CollectionSpec {
            model: "test".to_string(),
            dims: 2,
        }
    }

    #[tokio::test]
    async fn open_before_create_is_none() {
        let engine = InMemoryEngine::default();
        assert!(engine.open().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_the_collection() {
        let engine = InMemoryEngine::default();
        let coll = engine
            .create(&spec(), &[record("a.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        coll.add(&[record("b.txt", 1, vec![0.0, 1.0])]).await.unwrap();

        let reopened = engine.clone().open().await.unwrap().unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert_eq!(reopened.spec(), &spec());

        let hits = reopened.search(&[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].chunk.metadata.source, "b.txt");
    }

    #[tokio::test]
    async fn filter_restricts_results() {
        let engine = InMemoryEngine::default();
        let coll = engine
            .create(
                &spec(),
                &[
                    record("a.txt", 0, vec![0.1, 1.0]),
                    record("b.txt", 1, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        let filter = MetadataFilter::new().with("source", "a.txt");
        let hits = coll.search(&[0.0, 1.0], 4, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.metadata.source, "a.txt");
    }

    #[tokio::test]
    async fn delete_makes_open_return_none() {
        let engine = InMemoryEngine::default();
        let coll = engine
            .create(&spec(), &[record("a.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        coll.delete_collection().await.unwrap();
        assert!(engine.open().await.unwrap().is_none());
        let err = coll
            .add(&[record("b.txt", 1, vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreNotInitialized));
        let err = coll.search(&[1.0, 0.0], 1, None).await.unwrap_err();
        assert!(matches!(err, Error::StoreNotInitialized));
        assert!(matches!(coll.count().await, Err(Error::StoreNotInitialized)));
    }

    #[tokio::test]
    async fn create_with_other_spec_rejected() {
        let engine = InMemoryEngine::default();
        engine
            .create(&spec(), &[record("a.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let other = CollectionSpec {
            model: "other".to_string(),
            dims: 3,
        };
        let err = engine.create(&other, &[]).await.err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
