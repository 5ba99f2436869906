//! Pipeline orchestrator: the only component hosts call.
//!
//! ```text
//! index:  loader ──▶ DocumentProcessor ──▶ VectorStoreManager::add
//! query:  Retriever ──▶ Generator ──▶ answer (+ references, relevant_docs)
//! ```
//!
//! Each operation runs to completion before returning. Directory scans and
//! URL batches tolerate individual failures, but a batch in which every
//! attempted item failed is an error rather than a silent zero.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use ragline_core::embedding::{CompletionProvider, EmbeddingProvider};
use ragline_core::enrich::DocumentProcessor;
use ragline_core::models::GeneratedAnswer;
use ragline_core::store::{MetadataFilter, VectorEngine};
use ragline_core::{Error, Result};

use crate::config::Config;
use crate::embedding::create_embedding_provider;
use crate::generator::Generator;
use crate::llm::create_completion_provider;
use crate::loader::{DocumentLoader, FileLoader, LoadReport};
use crate::retriever::Retriever;
use crate::sqlite_store::SqliteEngine;
use crate::vector_store::{StoreStatus, VectorStoreManager};

/// Timeout for fetching web pages during `index_from_urls`.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Outcome of an indexing call.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    /// Source documents loaded.
    pub documents: usize,
    /// Chunks embedded and written.
    pub chunks: usize,
    /// `location: error` for every item that was skipped.
    pub failures: Vec<String>,
}

pub struct RagPipeline {
    loader: Arc<dyn DocumentLoader>,
    processor: DocumentProcessor,
    store: Arc<VectorStoreManager>,
    retriever: Retriever,
    generator: Generator,
}

impl RagPipeline {
    /// Wire a pipeline from explicit collaborators.
    pub fn new(
        config: &Config,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        engine: Arc<dyn VectorEngine>,
    ) -> Result<Self> {
        let processor =
            DocumentProcessor::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        if config.retrieval.num_documents == 0 {
            return Err(Error::Configuration(
                "retrieval.num_documents must be >= 1".to_string(),
            ));
        }

        let store = Arc::new(VectorStoreManager::new(
            engine,
            embedder,
            config.embedding.batch_size,
        ));
        Ok(Self {
            loader,
            processor,
            retriever: Retriever::new(store.clone(), config.retrieval.num_documents),
            store,
            generator: Generator::new(completion),
        })
    }

    /// Wire the shipped implementations: file/web loader, configured
    /// providers, and the SQLite engine at `store.path`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config,
            Arc::new(FileLoader::new(FETCH_TIMEOUT_SECS)?),
            create_embedding_provider(&config.embedding)?,
            create_completion_provider(&config.llm)?,
            Arc::new(SqliteEngine::new(&config.store.path)),
        )
    }

    /// Index a file, or a directory (top level unless `recursive`).
    pub async fn index(&self, source: &Path, recursive: bool) -> Result<IndexReport> {
        tracing::info!(source = %source.display(), recursive, "indexing");
        let report = if source.is_dir() {
            self.loader.load_directory(source, recursive).await?
        } else if source.exists() {
            LoadReport {
                documents: self.loader.load_path(source).await?,
                failures: Vec::new(),
            }
        } else {
            return Err(Error::load_failure(
                source.display().to_string(),
                "no such file or directory",
            ));
        };
        self.ingest(report).await
    }

    /// Fetch and index web pages.
    pub async fn index_from_urls(&self, urls: &[String]) -> Result<IndexReport> {
        tracing::info!(urls = urls.len(), "indexing urls");
        let report = self.loader.load_urls(urls).await?;
        self.ingest(report).await
    }

    async fn ingest(&self, report: LoadReport) -> Result<IndexReport> {
        let LoadReport {
            documents,
            mut failures,
        } = report;

        if documents.is_empty() && !failures.is_empty() {
            if failures.len() == 1 {
                return Err(failures.remove(0).error);
            }
            return Err(Error::load_failure(
                format!("{} sources", failures.len()),
                format!("every source failed to load; first error: {}", failures[0].error),
            ));
        }

        let chunks = self.processor.process_documents(&documents);
        let written = self.store.add(&chunks).await?;
        tracing::info!(
            documents = documents.len(),
            chunks = written,
            skipped = failures.len(),
            "indexing finished"
        );

        Ok(IndexReport {
            documents: documents.len(),
            chunks: written,
            failures: failures
                .iter()
                .map(|f| format!("{}: {}", f.location, f.error))
                .collect(),
        })
    }

    /// Plain answer to `question` over the retrieved context.
    pub async fn query(&self, question: &str, filter: Option<&MetadataFilter>) -> Result<String> {
        tracing::info!(filtered = filter.is_some(), "query");
        let chunks = self.retriever.retrieve(question, filter).await?;
        self.generator.generate_answer_only(question, chunks).await
    }

    /// Cited answer, numbered references, and the retrieved chunks.
    pub async fn query_with_citations(
        &self,
        question: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<GeneratedAnswer> {
        tracing::info!(filtered = filter.is_some(), "query with citations");
        let chunks = self.retriever.retrieve(question, filter).await?;
        self.generator.generate(question, chunks).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Load any persisted collection, then report the store state.
    pub async fn status(&self) -> Result<StoreStatus> {
        self.store.load().await?;
        self.store.status().await
    }
}
