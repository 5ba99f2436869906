//! Vector store manager: lifecycle of the single persisted collection.
//!
//! ```text
//!                add (none persisted) ──▶ create
//!   Uninitialized ──────────────────────────────────▶ Active ──add──▶ append
//!        ▲        search / load (persisted) ──▶ open    │
//!        └──────────────────── clear ◀──────────────────┘
//! ```
//!
//! Writes (`add`, `clear`) are serialized per collection location through a
//! process-wide lock registry, so two managers pointed at the same path never
//! write at once and searches never overlap a write. Each manager keeps its
//! own state behind a `tokio::sync::RwLock`; the location lock is always
//! taken first.
//!
//! A handle can outlive its collection when another process clears it. The
//! engines report that as [`Error::StoreNotInitialized`]; the manager then
//! drops the handle and goes back through `open` (search) or `create` (add).

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::RwLock;

use ragline_core::embedding::EmbeddingProvider;
use ragline_core::models::Chunk;
use ragline_core::store::{
    CollectionSpec, EmbeddedChunk, MetadataFilter, SearchHit, VectorCollection, VectorEngine,
};
use ragline_core::{Error, Result};

enum StoreState {
    Uninitialized,
    Active(Arc<dyn VectorCollection>),
}

impl StoreState {
    /// Forget `stale` unless another task already replaced it.
    fn reset_if(&mut self, stale: &Arc<dyn VectorCollection>) {
        if matches!(self, StoreState::Active(current) if Arc::ptr_eq(current, stale)) {
            *self = StoreState::Uninitialized;
        }
    }
}

/// Shared lock for every manager bound to `location`.
fn location_lock(location: &str) -> Arc<RwLock<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<String, Arc<RwLock<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(location.to_string()).or_default().clone()
}

/// Externally visible store state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StoreStatus {
    Uninitialized,
    Active {
        model: String,
        dims: usize,
        location: String,
        chunks: usize,
    },
}

pub struct VectorStoreManager {
    engine: Arc<dyn VectorEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    location_lock: Arc<RwLock<()>>,
    state: RwLock<StoreState>,
}

impl VectorStoreManager {
    pub fn new(
        engine: Arc<dyn VectorEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        let location_lock = location_lock(&engine.location());
        Self {
            engine,
            embedder,
            batch_size: batch_size.max(1),
            location_lock,
            state: RwLock::new(StoreState::Uninitialized),
        }
    }

    fn embedder_spec(&self) -> CollectionSpec {
        CollectionSpec {
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
        }
    }

    fn check_spec(&self, collection: &dyn VectorCollection) -> Result<()> {
        let ours = self.embedder_spec();
        let theirs = collection.spec();
        if *theirs != ours {
            return Err(Error::Configuration(format!(
                "collection at {} was built with {} ({} dims) but the embedding provider is {} ({} dims)",
                self.engine.location(),
                theirs.model,
                theirs.dims,
                ours.model,
                ours.dims
            )));
        }
        Ok(())
    }

    async fn create(
        &self,
        spec: &CollectionSpec,
        records: &[EmbeddedChunk],
    ) -> Result<Arc<dyn VectorCollection>> {
        tracing::info!(
            location = %self.engine.location(),
            model = %spec.model,
            dims = spec.dims,
            "creating collection"
        );
        self.engine.create(spec, records).await
    }

    /// Embed `chunks` and write them, creating the collection on first use.
    /// Returns the number of chunks written. Empty input is a no-op.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let _location = self.location_lock.write().await;
        let mut state = self.state.write().await;
        let existing = match &*state {
            StoreState::Active(collection) => Some(collection.clone()),
            StoreState::Uninitialized => self.engine.open().await?,
        };
        if let Some(collection) = &existing {
            self.check_spec(collection.as_ref())?;
        }

        let spec = self.embedder_spec();
        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Provider(format!(
                    "expected {} embeddings, provider returned {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != spec.dims {
                    return Err(Error::DimensionMismatch {
                        expected: spec.dims,
                        actual: vector.len(),
                    });
                }
                records.push(EmbeddedChunk {
                    chunk: chunk.clone(),
                    vector,
                });
            }
        }

        let collection = match existing {
            Some(collection) => match collection.add(&records).await {
                Ok(()) => collection,
                Err(Error::StoreNotInitialized) => {
                    tracing::warn!(
                        location = %self.engine.location(),
                        "collection was deleted by another process"
                    );
                    *state = StoreState::Uninitialized;
                    self.create(&spec, &records).await?
                }
                Err(e) => return Err(e),
            },
            None => self.create(&spec, &records).await?,
        };
        collection.persist().await?;
        *state = StoreState::Active(collection);

        tracing::info!(chunks = records.len(), "added chunks to vector store");
        Ok(records.len())
    }

    /// Bind to the persisted collection if there is one.
    pub async fn load(&self) -> Result<bool> {
        let _location = self.location_lock.read().await;
        let mut state = self.state.write().await;
        if let StoreState::Active(collection) = &*state {
            match collection.count().await {
                Ok(_) => return Ok(true),
                Err(Error::StoreNotInitialized) => *state = StoreState::Uninitialized,
                Err(e) => return Err(e),
            }
        }
        match self.engine.open().await? {
            Some(collection) => {
                tracing::info!(location = %self.engine.location(), "loaded persisted collection");
                *state = StoreState::Active(collection);
                Ok(true)
            }
            None => {
                tracing::debug!(location = %self.engine.location(), "no persisted collection");
                Ok(false)
            }
        }
    }

    /// Top-`k` chunks for `query`, most similar first, restricted by
    /// `filter`. Loads the persisted collection on first use, and again when
    /// the loaded one was deleted elsewhere.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        let _location = self.location_lock.read().await;
        let stale = {
            let state = self.state.read().await;
            match &*state {
                StoreState::Active(collection) => {
                    match self.search_in(collection.as_ref(), query, k, filter).await {
                        Err(Error::StoreNotInitialized) => Some(collection.clone()),
                        result => return result,
                    }
                }
                StoreState::Uninitialized => None,
            }
        };

        let mut state = self.state.write().await;
        if let Some(stale) = &stale {
            tracing::warn!(
                location = %self.engine.location(),
                "loaded collection no longer exists, reopening"
            );
            state.reset_if(stale);
        }
        if matches!(&*state, StoreState::Uninitialized) {
            match self.engine.open().await? {
                Some(collection) => {
                    tracing::info!(location = %self.engine.location(), "loaded persisted collection");
                    *state = StoreState::Active(collection);
                }
                None => return Err(Error::StoreNotInitialized),
            }
        }

        let state = state.downgrade();
        match &*state {
            StoreState::Active(collection) => {
                self.search_in(collection.as_ref(), query, k, filter).await
            }
            StoreState::Uninitialized => Err(Error::StoreNotInitialized),
        }
    }

    async fn search_in(
        &self,
        collection: &dyn VectorCollection,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.check_spec(collection)?;
        let query_vec = self.embedder.embed_query(query).await?;
        let hits = collection.search(&query_vec, k, filter).await?;
        tracing::debug!(k, hits = hits.len(), filtered = filter.is_some(), "vector search");
        Ok(hits)
    }

    /// Delete the persisted collection, loaded or not, and return to
    /// `Uninitialized`. Clearing an empty store is a no-op.
    pub async fn clear(&self) -> Result<()> {
        let _location = self.location_lock.write().await;
        let mut state = self.state.write().await;
        let collection = match &*state {
            StoreState::Active(collection) => Some(collection.clone()),
            StoreState::Uninitialized => self.engine.open().await?,
        };
        if let Some(collection) = collection {
            match collection.delete_collection().await {
                Ok(()) | Err(Error::StoreNotInitialized) => {}
                Err(e) => return Err(e),
            }
            tracing::info!(location = %self.engine.location(), "deleted collection");
        }
        *state = StoreState::Uninitialized;
        Ok(())
    }

    /// Current state, without loading anything. A loaded collection that was
    /// deleted elsewhere reports `Uninitialized`.
    pub async fn status(&self) -> Result<StoreStatus> {
        let _location = self.location_lock.read().await;
        let stale = {
            let state = self.state.read().await;
            match &*state {
                StoreState::Uninitialized => return Ok(StoreStatus::Uninitialized),
                StoreState::Active(collection) => match collection.count().await {
                    Ok(chunks) => {
                        return Ok(StoreStatus::Active {
                            model: collection.spec().model.clone(),
                            dims: collection.spec().dims,
                            location: self.engine.location(),
                            chunks,
                        })
                    }
                    Err(Error::StoreNotInitialized) => collection.clone(),
                    Err(e) => return Err(e),
                },
            }
        };
        self.state.write().await.reset_if(&stale);
        Ok(StoreStatus::Uninitialized)
    }
}
