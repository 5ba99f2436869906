//! Core data models used throughout ragline.
//!
//! These types represent the documents, chunks, and references that flow
//! through the indexing and query pipeline:
//!
//! ```text
//! RawDocument ──enrich──▶ Document ──split──▶ Chunk ──retrieve──▶ Reference
//! ```
//!
//! Loader output ([`RawDocument`]) carries an untyped metadata map. After
//! enrichment every document and chunk carries a typed record whose
//! required fields are always present; anything else the loader supplied
//! (page numbers, URLs, content types) rides along in `extra`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Fallback `source` for documents whose loader supplied none.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Fallback `title` when none is supplied and the source is not a local file.
pub const UNTITLED_DOCUMENT: &str = "Untitled Document";

/// Raw loader output before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl RawDocument {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.into()));
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Document with an arbitrary metadata map (may lack `source`).
    pub fn with_metadata(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn insert(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Enriched metadata of a whole source document, before splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub source: String,
    pub title: String,
    /// ISO-8601 timestamp, set once.
    pub created_at: String,
    /// Position of the document in its indexing batch.
    pub doc_id: usize,
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    /// Flat JSON form, including the `doc_index` alias.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("source".into(), Value::String(self.source.clone()));
        map.insert("title".into(), Value::String(self.title.clone()));
        map.insert("created_at".into(), Value::String(self.created_at.clone()));
        map.insert("doc_index".into(), Value::from(self.doc_id));
        map.insert("doc_id".into(), Value::from(self.doc_id));
        map
    }
}

/// Metadata attached to every stored chunk.
///
/// Serializes as one flat object with both spellings of the positional
/// fields (`doc_index`/`doc_id`, `chunk_index`/`chunk_id`), so metadata
/// filters can use either.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub title: String,
    pub created_at: String,
    pub doc_id: usize,
    /// Position of the chunk in the split output of its batch.
    pub chunk_id: usize,
    pub extra: Map<String, Value>,
}

const RESERVED_KEYS: [&str; 7] = [
    "source",
    "title",
    "created_at",
    "doc_index",
    "doc_id",
    "chunk_index",
    "chunk_id",
];

impl ChunkMetadata {
    pub fn from_document(doc: &DocumentMetadata, chunk_id: usize) -> Self {
        Self {
            source: doc.source.clone(),
            title: doc.title.clone(),
            created_at: doc.created_at.clone(),
            doc_id: doc.doc_id,
            chunk_id,
            extra: doc.extra.clone(),
        }
    }

    /// Look up a field by its serialized name, aliases included.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "source" => Some(Value::String(self.source.clone())),
            "title" => Some(Value::String(self.title.clone())),
            "created_at" => Some(Value::String(self.created_at.clone())),
            "doc_index" | "doc_id" => Some(Value::from(self.doc_id)),
            "chunk_index" | "chunk_id" => Some(Value::from(self.chunk_id)),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("source".into(), Value::String(self.source.clone()));
        map.insert("title".into(), Value::String(self.title.clone()));
        map.insert("created_at".into(), Value::String(self.created_at.clone()));
        map.insert("doc_index".into(), Value::from(self.doc_id));
        map.insert("doc_id".into(), Value::from(self.doc_id));
        map.insert("chunk_index".into(), Value::from(self.chunk_id));
        map.insert("chunk_id".into(), Value::from(self.chunk_id));
        map
    }

    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, String> {
        let source = take_string(&mut map, "source")?;
        let title = take_string(&mut map, "title")?;
        let created_at = take_string(&mut map, "created_at")?;
        let doc_id = take_index(&mut map, "doc_id", "doc_index")?;
        let chunk_id = take_index(&mut map, "chunk_id", "chunk_index")?;
        for key in RESERVED_KEYS {
            map.remove(key);
        }
        Ok(Self {
            source,
            title,
            created_at,
            doc_id,
            chunk_id,
            extra: map,
        })
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<String, String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("metadata field `{}` must be a string, got {}", key, other)),
        None => Err(format!("metadata field `{}` is missing", key)),
    }
}

fn take_index(map: &mut Map<String, Value>, key: &str, alias: &str) -> Result<usize, String> {
    let value = map.get(key).or_else(|| map.get(alias));
    value
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| format!("metadata field `{}` must be a non-negative integer", key))
}

impl Serialize for ChunkMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChunkMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        ChunkMetadata::from_map(map).map_err(D::Error::custom)
    }
}

/// A normalized, enriched document ready for splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A bounded slice of a document: the unit that is embedded, stored,
/// and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A numbered pointer from generated prose back to a retrieved chunk.
///
/// `id` is the 1-based position in the current retrieval result, not the
/// chunk's stored `chunk_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: usize,
    pub source: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub chunk_id: usize,
}

/// Result of a citation-aware generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub references: Vec<Reference>,
    /// The retrieved chunks verbatim, for audit and display.
    pub relevant_docs: Vec<Chunk>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ChunkMetadata {
        let mut extra = Map::new();
        extra.insert("page".into(), json!(3));
        ChunkMetadata {
            source: "docs/a.pdf".into(),
            title: "a.pdf".into(),
            created_at: "2024-05-01T10:00:00+00:00".into(),
            doc_id: 1,
            chunk_id: 7,
            extra,
        }
    }

    #[test]
    fn chunk_metadata_serializes_flat_with_aliases() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["source"], "docs/a.pdf");
        assert_eq!(value["doc_index"], 1);
        assert_eq!(value["doc_id"], 1);
        assert_eq!(value["chunk_index"], 7);
        assert_eq!(value["chunk_id"], 7);
        assert_eq!(value["page"], 3);
    }

    #[test]
    fn chunk_metadata_deserialize_strips_aliases_from_extra() {
        let value = serde_json::to_value(sample()).unwrap();
        let back: ChunkMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample());
        assert!(!back.extra.contains_key("chunk_index"));
    }

    #[test]
    fn chunk_metadata_rejects_missing_source() {
        let err = serde_json::from_value::<ChunkMetadata>(json!({
            "title": "t", "created_at": "x", "doc_id": 0, "chunk_id": 0
        }))
        .unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn get_resolves_aliases_and_extras() {
        let meta = sample();
        assert_eq!(meta.get("chunk_index"), Some(json!(7)));
        assert_eq!(meta.get("page"), Some(json!(3)));
        assert_eq!(meta.get("missing"), None);
    }
}
