//! Metadata enrichment and the document processing pass.
//!
//! [`enrich_metadata`] turns a loader's untyped metadata map into a
//! [`DocumentMetadata`] record. [`DocumentProcessor`] runs the full
//! index-side transformation for one batch: enrich → clean → split →
//! number chunks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::path::Path;

use crate::chunk::{clean, TextSplitter};
use crate::error::Result;
use crate::models::{
    Chunk, Document, DocumentMetadata, RawDocument, UNKNOWN_SOURCE, UNTITLED_DOCUMENT,
};

/// Enrich a document's metadata, never mutating the input.
///
/// Rule order:
/// 1. copy the input map;
/// 2. set `doc_index`/`doc_id` from `doc_index`, unconditionally;
/// 3. set `created_at` only if absent;
/// 4. set `source` only if absent (`"Unknown"`);
/// 5. derive `title` only if absent: the file name when `source` is an
///    existing local file, otherwise `"Untitled Document"`.
///
/// Empty strings count as absent. Fields already present are left as they
/// are, which makes enrichment idempotent.
pub fn enrich_metadata(raw: &Map<String, Value>, doc_index: usize) -> DocumentMetadata {
    enrich_metadata_at(raw, doc_index, Utc::now())
}

/// [`enrich_metadata`] with an explicit clock.
pub fn enrich_metadata_at(
    raw: &Map<String, Value>,
    doc_index: usize,
    now: DateTime<Utc>,
) -> DocumentMetadata {
    let mut extra = raw.clone();
    let created_at = take_text(&mut extra, "created_at")
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, false));
    let source = take_text(&mut extra, "source").unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
    let title = take_text(&mut extra, "title").unwrap_or_else(|| derive_title(&source));
    for key in ["doc_index", "doc_id", "chunk_index", "chunk_id"] {
        extra.remove(key);
    }

    DocumentMetadata {
        source,
        title,
        created_at,
        doc_id: doc_index,
        extra,
    }
}

fn take_text(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Title for a source with none supplied.
pub fn derive_title(source: &str) -> String {
    let path = Path::new(source);
    if path.is_file() {
        if let Some(name) = path.file_name() {
            return name.to_string_lossy().to_string();
        }
    }
    UNTITLED_DOCUMENT.to_string()
}

/// Index-side processing for one batch of raw documents.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    splitter: TextSplitter,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self {
            splitter: TextSplitter::new(chunk_size, chunk_overlap)?,
        })
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Enrich and clean each document (position = `doc_id`), then split
    /// the batch. `chunk_id`s are unique and contiguous from 0 within the
    /// returned batch only.
    pub fn process_documents(&self, documents: &[RawDocument]) -> Vec<Chunk> {
        let enriched: Vec<Document> = documents
            .iter()
            .enumerate()
            .map(|(i, raw)| Document {
                content: clean(&raw.content),
                metadata: enrich_metadata(&raw.metadata, i),
            })
            .collect();
        self.splitter.split_documents(&enriched)
    }
}
