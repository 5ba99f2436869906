//! Text normalization and overlapping recursive chunker.
//!
//! [`clean`] performs a lossy, best-effort normalization of raw loader text.
//! [`TextSplitter`] partitions text into windows of at most `chunk_size`
//! characters, repeating up to `chunk_overlap` characters of trailing context
//! at the start of the next window.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` always matches and splits into single characters).
//! 2. Split on it and drop empty pieces.
//! 3. Pieces shorter than `chunk_size` are buffered; a piece that is too long
//!    flushes the buffer and is split recursively with the remaining
//!    separators.
//! 4. Buffered pieces are merged greedily, joined by the separator. When the
//!    next piece would overflow `chunk_size`, the window is emitted and pieces
//!    are dropped from its front until at most `chunk_overlap` characters
//!    remain; those carry over into the next window.
//!
//! All lengths are counted in `char`s, so multibyte text never splits inside
//! a code point.
//!
//! # Example
//!
//! ```rust
//! use ragline_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(20, 8).unwrap();
//! let pieces = splitter.split_text("alpha beta gamma delta epsilon zeta");
//! assert!(pieces.iter().all(|p| p.chars().count() <= 20));
//! assert!(pieces.len() > 1);
//! ```

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::models::{Chunk, ChunkMetadata, Document};

/// Separators tried in priority order: paragraph, line, word, character.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://\S+").expect("valid URL pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Normalize raw text: strip URL-shaped substrings, collapse every
/// whitespace run to a single space, and trim both ends.
///
/// This is not a markup stripper; HTML is handled by the loaders.
pub fn clean(text: &str) -> String {
    let without_urls = url_pattern().replace_all(text, "");
    whitespace_pattern()
        .replace_all(&without_urls, " ")
        .trim()
        .to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Recursive character splitter with overlap.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split one text into overlapping windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document, preserving input order.
    ///
    /// Each chunk inherits its document's metadata; `chunk_id` is the
    /// chunk's position in the combined output, starting at 0.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            for piece in self.split_text(&doc.content) {
                let chunk_id = chunks.len();
                chunks.push(Chunk {
                    content: piece,
                    metadata: ChunkMetadata::from_document(&doc.metadata, chunk_id),
                });
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut output = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_on(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                output.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    output.push(trimmed.to_string());
                }
            } else {
                output.extend(self.split_recursive(piece, remaining));
            }
        }
        if !pending.is_empty() {
            output.extend(self.merge(&pending, separator));
        }
        output
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current, separator);
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let dropped = char_len(current[0]) + if current.len() > 1 { sep_len } else { 0 };
                    total -= dropped;
                    current.remove(0);
                }
            }
            current.push(piece);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }
        push_window(&mut windows, &current, separator);
        windows
    }
}

fn push_window(windows: &mut Vec<String>, pieces: &[&str], separator: &str) {
    let joined = pieces.join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    }
}

/// Split `documents` with a freshly configured [`TextSplitter`].
pub fn split(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(TextSplitter::new(chunk_size, chunk_overlap)?.split_documents(documents))
}
