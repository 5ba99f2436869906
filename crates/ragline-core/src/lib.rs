//! # ragline core
//!
//! Shared logic for ragline: error taxonomy, data models, text
//! normalization and chunking, metadata enrichment, provider traits, the
//! vector engine abstraction, and citation formatting.
//!
//! This crate contains no tokio, sqlx, or network dependencies. Concrete
//! providers, loaders, and the SQLite engine live in the `ragline` crate.

pub mod chunk;
pub mod citation;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod models;
pub mod store;

pub use error::{Error, Result};
