//! Embedding provider implementations.
//!
//! Concrete backends for [`EmbeddingProvider`]:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible `POST /embeddings` endpoint.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! # Provider Selection
//!
//! Use [`create_embedding_provider`] to instantiate the provider named in
//! the configuration:
//!
//! ```rust,no_run
//! # use ragline::config::EmbeddingConfig;
//! # use ragline::embedding::create_embedding_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_embedding_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! Failed calls are reported as [`Error::Provider`] and never retried.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use ragline_core::embedding::EmbeddingProvider;
use ragline_core::{Error, Result};

use crate::config::EmbeddingConfig;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Resolve the OpenAI-compatible base URL: explicit config, then
/// `OPENAI_BASE_URL`, then the public endpoint.
pub(crate) fn openai_base_url(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn openai_api_key() -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Searching or indexing with
/// it fails with a configuration error; loading an existing collection's
/// status still works.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Configuration(
            "embedding provider is disabled; set [embedding] provider in the config".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API (or any compatible server).
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::Configuration("embedding.model required for OpenAI provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            Error::Configuration("embedding.dims required for OpenAI provider".to_string())
        })?;

        Ok(Self {
            model,
            dims,
            base_url: openai_base_url(config.base_url.as_deref()),
            api_key: openai_api_key()?,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(Error::provider)?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding` arrays, ordered by their `index` field.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Provider("Invalid OpenAI response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Provider("Invalid OpenAI response: missing embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);

        indexed.push((index, parse_vector(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Requires an embedding model to be pulled,
/// e.g. `ollama pull nomic-embed-text`.
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::Configuration("embedding.model required for Ollama provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            Error::Configuration("embedding.dims required for Ollama provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            model,
            dims,
            url,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::Provider(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(Error::provider)?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::Provider("Invalid Ollama response: missing embeddings array".into())
        })?;

    embeddings
        .iter()
        .map(|item| {
            let values = item.as_array().ok_or_else(|| {
                Error::Provider("Invalid Ollama response: embedding is not an array".into())
            })?;
            parse_vector(values, "Ollama")
        })
        .collect()
}

/// Every entry must be a JSON number; anything else fails the batch.
fn parse_vector(values: &[serde_json::Value], provider: &str) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|x| x as f32).ok_or_else(|| {
                Error::Provider(format!(
                    "Invalid {} response: non-numeric embedding value {}",
                    provider, v
                ))
            })
        })
        .collect()
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => Err(Error::Configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
