//! # ragline
//!
//! Citation-aware retrieval-augmented question answering over local
//! documents and web pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Loaders    │──▶│  Normalize   │──▶│ VectorStore   │
//! │ FS/PDF/Web   │   │ Chunk+Enrich │   │ embed+SQLite  │
//! └──────────────┘   └──────────────┘   └──────┬────────┘
//!                                              │ top-k
//!                                       ┌──────▼────────┐
//!                                       │   Generator   │
//!                                       │ [n] citations │
//!                                       └──────┬────────┘
//!                               ┌──────────────┤
//!                               ▼              ▼
//!                          ┌─────────┐    ┌─────────┐
//!                          │   CLI   │    │  HTTP   │
//!                          └─────────┘    └─────────┘
//! ```
//!
//! Pure logic (chunking, enrichment, ranking, citation formatting) lives in
//! the `ragline-core` crate; this crate adds providers, loaders, SQLite
//! persistence and the two hosts.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | PDF / DOCX / HTML text extraction |
//! | [`loader`] | File, directory and URL loading |
//! | [`embedding`] | OpenAI and Ollama embedding providers |
//! | [`llm`] | Chat completion provider |
//! | [`db`] | SQLite connection |
//! | [`sqlite_store`] | Persistent vector collection |
//! | [`vector_store`] | Create-or-append, lazy load, filtered search, clear |
//! | [`retriever`] | Top-k retrieval |
//! | [`generator`] | Citation-aware answer generation |
//! | [`pipeline`] | Orchestrator used by both hosts |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generator;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod retriever;
pub mod server;
pub mod sqlite_store;
pub mod vector_store;
