//! Reference extraction, context formatting, and prompt templates.
//!
//! Everything here is pure: the generator in the app crate feeds retrieved
//! chunks in, sends the resulting prompt to a [`CompletionProvider`], and
//! packages the answer with the references built here.
//!
//! Reference numbers are positions in the retrieval result (1-based), so the
//! `[n]` markers in the context block, the reference list, and the model's
//! answer all line up.
//!
//! [`CompletionProvider`]: crate::embedding::CompletionProvider

use serde_json::Value;

use crate::models::{Chunk, Reference, UNKNOWN_SOURCE, UNTITLED_DOCUMENT};

/// Which prompt template to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStyle {
    /// Inline `[n]` citations and a trailing "Sources" section.
    Cited,
    /// Answer from context with no citation instructions.
    Plain,
}

/// One [`Reference`] per chunk, numbered from 1 in retrieval order.
pub fn extract_references(chunks: &[Chunk]) -> Vec<Reference> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let meta = &chunk.metadata;
            Reference {
                id: i + 1,
                source: non_empty(&meta.source, UNKNOWN_SOURCE),
                title: non_empty(&meta.title, UNTITLED_DOCUMENT),
                page: meta.extra.get("page").and_then(display_value),
                url: meta.extra.get("url").and_then(display_value),
                chunk_id: meta.chunk_id,
            }
        })
        .collect()
}

fn non_empty(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Render references one per line:
/// `[id] 来源：《title》[，页码：page][，URL：url]`.
pub fn format_references(references: &[Reference]) -> String {
    references
        .iter()
        .map(|r| {
            let mut line = format!("[{}] 来源：《{}》", r.id, r.title);
            if let Some(page) = &r.page {
                line.push_str(&format!("，页码：{}", page));
            }
            if let Some(url) = &r.url {
                line.push_str(&format!("，URL：{}", url));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chunk texts prefixed `[n] `, separated by a blank line.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the template for `style`.
///
/// Substitution is a single pass, so braces or template markers inside
/// retrieved text or the question are passed through literally.
pub fn build_prompt(style: AnswerStyle, question: &str, chunks: &[Chunk]) -> String {
    let context = format_context(chunks);
    match style {
        AnswerStyle::Plain => format!(
            "You are a helpful AI assistant. Answer the question based on the provided context.\n\n\
             Context:\n{context}\n\n\
             Question: {question}\n\n\
             Answer:"
        ),
        AnswerStyle::Cited => {
            let references = format_references(&extract_references(chunks));
            format!(
                "You are a helpful AI assistant. Answer the question using only the provided context.\n\
                 Follow these rules:\n\
                 1. Cite the passages you rely on inline with their numbers, for example [1] or [2][3].\n\
                 2. End your answer with a \"Sources\" section listing the references you cited.\n\
                 3. If the context does not contain enough information to answer, say so plainly instead of guessing.\n\n\
                 Context:\n{context}\n\n\
                 References:\n{references}\n\n\
                 Question: {question}\n\n\
                 Answer:"
            )
        }
    }
}
