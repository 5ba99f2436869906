//! Citation-aware answer generation.
//!
//! Both answer styles share one path: number the retrieved chunks, build
//! the references, fill the template, and call the completion provider
//! exactly once. The style only selects the template.

use std::sync::Arc;

use ragline_core::citation::{build_prompt, extract_references, AnswerStyle};
use ragline_core::embedding::CompletionProvider;
use ragline_core::models::{Chunk, GeneratedAnswer};
use ragline_core::Result;

pub struct Generator {
    provider: Arc<dyn CompletionProvider>,
}

impl Generator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Generate an answer over `chunks` in the given style. Provider
    /// failures propagate; nothing partial is returned.
    pub async fn run(
        &self,
        question: &str,
        chunks: Vec<Chunk>,
        style: AnswerStyle,
    ) -> Result<GeneratedAnswer> {
        let references = extract_references(&chunks);
        let prompt = build_prompt(style, question, &chunks);
        tracing::debug!(
            model = %self.provider.model_name(),
            ?style,
            context_chunks = chunks.len(),
            prompt_chars = prompt.len(),
            "calling completion provider"
        );

        let answer = self.provider.complete(&prompt).await?;
        Ok(GeneratedAnswer {
            answer,
            references,
            relevant_docs: chunks,
        })
    }

    /// Answer with inline citations, plus references and the raw chunks.
    pub async fn generate(&self, question: &str, chunks: Vec<Chunk>) -> Result<GeneratedAnswer> {
        self.run(question, chunks, AnswerStyle::Cited).await
    }

    /// Plain answer text only.
    pub async fn generate_answer_only(&self, question: &str, chunks: Vec<Chunk>) -> Result<String> {
        Ok(self.run(question, chunks, AnswerStyle::Plain).await?.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragline_core::models::ChunkMetadata;
    use ragline_core::Error;
    use serde_json::Map;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionProvider for Recorder {
        fn model_name(&self) -> &str {
            "recorder"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Rust is a language [1].".to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl CompletionProvider for Broken {
        fn model_name(&self) -> &str {
            "broken"
        }
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(Error::Provider("503 Service Unavailable".to_string()))
        }
    }

    fn chunk(content: &str, chunk_id: usize) -> Chunk {
        Chunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                source: "docs/rust.md".to_string(),
                title: "rust.md".to_string(),
                created_at: "2024-01-01T00:00:00+00:00".to_string(),
                doc_id: 0,
                chunk_id,
                extra: Map::new(),
            },
        }
    }

    #[tokio::test]
    async fn generate_packages_answer_references_and_chunks() {
        let recorder = Arc::new(Recorder::default());
        let generator = Generator::new(recorder.clone());
        let chunks = vec![chunk("Rust is a systems language.", 9)];

        let answer = generator.generate("What is Rust?", chunks.clone()).await.unwrap();
        assert_eq!(answer.answer, "Rust is a language [1].");
        assert_eq!(answer.references.len(), 1);
        assert_eq!(answer.references[0].id, 1);
        assert_eq!(answer.references[0].chunk_id, 9);
        assert_eq!(answer.relevant_docs, chunks);

        let prompts = recorder.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[1] Rust is a systems language."));
        assert!(prompts[0].contains("Sources"));
    }

    #[tokio::test]
    async fn answer_only_uses_plain_template() {
        let recorder = Arc::new(Recorder::default());
        let generator = Generator::new(recorder.clone());
        let text = generator
            .generate_answer_only("What is Rust?", vec![chunk("Rust.", 0)])
            .await
            .unwrap();
        assert_eq!(text, "Rust is a language [1].");
        assert!(!recorder.prompts.lock().unwrap()[0].contains("Sources"));
    }

    #[tokio::test]
    async fn empty_context_still_calls_provider() {
        let recorder = Arc::new(Recorder::default());
        let generator = Generator::new(recorder.clone());
        let answer = generator.generate("anything?", Vec::new()).await.unwrap();
        assert!(answer.references.is_empty());
        assert_eq!(recorder.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let generator = Generator::new(Arc::new(Broken));
        let err = generator.generate("q", vec![chunk("x", 0)]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
