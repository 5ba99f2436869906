//! Generative model providers.
//!
//! - **[`OpenAIChatProvider`]**: single-turn `POST /chat/completions` call.
//! - **[`DisabledCompletionProvider`]**: returns errors; lets indexing and
//!   status commands run without LLM credentials.

use async_trait::async_trait;
use std::sync::Arc;

use ragline_core::embedding::CompletionProvider;
use ragline_core::{Error, Result};

use crate::config::LlmConfig;
use crate::embedding::{http_client, openai_api_key, openai_base_url};

pub struct DisabledCompletionProvider;

#[async_trait]
impl CompletionProvider for DisabledCompletionProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(Error::Configuration(
            "llm provider is disabled; set [llm] provider in the config".to_string(),
        ))
    }
}

/// Chat model behind an OpenAI-compatible API. The prompt is sent as one
/// user message at the configured temperature.
pub struct OpenAIChatProvider {
    model: String,
    temperature: f32,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIChatProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: openai_base_url(config.base_url.as_deref()),
            api_key: openai_api_key()?,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIChatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
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
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Provider("Invalid OpenAI response: missing choices[0].message.content".into())
        })
}

/// Create the [`CompletionProvider`] named by `config.provider`.
pub fn create_completion_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletionProvider)),
        "openai" => Ok(Arc::new(OpenAIChatProvider::new(config)?)),
        other => Err(Error::Configuration(format!(
            "Unknown llm provider: {}",
            other
        ))),
    }
}
