//! TOML configuration.
//!
//! The configuration is read once at startup, validated, and then passed by
//! reference to every constructor. Nothing reads it again after that.
//!
//! ```toml
//! [store]
//! path = "./data/vectordb/ragline.sqlite"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! num_documents = 4
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-ada-002"
//! dims = 1536
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-3.5-turbo"
//! temperature = 0.0
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! API credentials are never stored in the file: providers read
//! `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`) from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite file holding the persisted collection.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default `k` for similarity search.
    #[serde(default = "default_num_documents")]
    pub num_documents: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_documents: default_num_documents(),
        }
    }
}

fn default_num_documents() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for the OpenAI-compatible endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Ollama server URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            timeout_secs: 30,
            base_url: None,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_llm_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Also write JSON logs to this file, rotated daily (5 files kept).
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults with both providers disabled, rooted at `store_path`.
    pub fn minimal(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig {
                path: store_path.into(),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.num_documents < 1 {
            anyhow::bail!("retrieval.num_documents must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.batch_size == 0 {
                anyhow::bail!("embedding.batch_size must be > 0");
            }
        }

        match self.llm.provider.as_str() {
            "disabled" | "openai" => {}
            other => anyhow::bail!(
                "Unknown llm provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let config = parse("[store]\npath = \"./data/x.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.num_documents, 4);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = parse(
            "[store]\npath = \"x\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn enabled_embedding_requires_model_and_dims() {
        let err = parse("[store]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let ok = parse(
            "[store]\npath = \"x\"\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn unknown_providers_rejected() {
        assert!(parse("[store]\npath = \"x\"\n[embedding]\nprovider = \"cohere\"\n").is_err());
        assert!(parse("[store]\npath = \"x\"\n[llm]\nprovider = \"anthropic\"\n").is_err());
    }

    #[test]
    fn temperature_range_checked() {
        assert!(parse("[store]\npath = \"x\"\n[llm]\ntemperature = 3.5\n").is_err());
    }

    #[test]
    fn log_file_is_optional() {
        let config = parse("[store]\npath = \"x\"\n").unwrap();
        assert!(config.logging.file.is_none());

        let config = parse(
            "[store]\npath = \"x\"\n[logging]\nlevel = \"debug\"\nfile = \"logs/ragline.log\"\n",
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("logs/ragline.log"))
        );
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
