//! Shared fixtures: deterministic offline providers and file builders.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ragline::config::Config;
use ragline::loader::FileLoader;
use ragline::pipeline::RagPipeline;
use ragline::sqlite_store::SqliteEngine;
use ragline_core::embedding::{CompletionProvider, EmbeddingProvider};
use ragline_core::Result;

pub const DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase alphanumeric token bumps one of
/// `DIMS` buckets chosen by FNV-1a. Texts sharing words score higher.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % DIMS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Completion provider that records prompts and returns a fixed answer.
pub struct ScriptedCompletion {
    answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Small windows so a couple of paragraphs yield several chunks.
pub fn test_config(store_path: &Path) -> Config {
    let mut config = Config::minimal(store_path);
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 20;
    config.retrieval.num_documents = 4;
    config
}

pub fn build_pipeline(store_path: &Path, completion: Arc<ScriptedCompletion>) -> RagPipeline {
    RagPipeline::new(
        &test_config(store_path),
        Arc::new(FileLoader::new(5).unwrap()),
        Arc::new(HashEmbedder),
        completion,
        Arc::new(SqliteEngine::new(store_path)),
    )
    .unwrap()
}

pub const RUST_DOC: &str = "Rust is a systems programming language focused on safety. \
The borrow checker enforces ownership rules at compile time.\n\n\
Ownership means every value has a single owner. When the owner goes out of scope \
the value is dropped and its memory is released.";

pub const GARDEN_DOC: &str = "Tomatoes need full sun and regular watering. \
Mulch keeps the soil moist during the hot summer months.\n\n\
Prune the lower leaves of tomato plants to improve airflow and reduce disease.";

/// A `docs/` directory with one markdown and one text file.
pub fn write_corpus(root: &Path) -> PathBuf {
    let docs = root.join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("rust.md"), RUST_DOC).unwrap();
    std::fs::write(docs.join("garden.txt"), GARDEN_DOC).unwrap();
    docs
}

/// Minimal docx (ZIP) whose single paragraph is `text`.
pub fn minimal_docx_with_text(text: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}
