//! SQLite-backed [`VectorEngine`] implementation.
//!
//! One database file holds one collection:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `collection_meta` | single row: embedding model, dims, creation time |
//! | `embeddings` | one row per chunk: uuid, text, metadata JSON, content hash, vector BLOB |
//!
//! Search loads every row, applies the metadata filter, and ranks by cosine
//! similarity in Rust. Rows are read in insertion order (`seq`), so equal
//! scores come back in the order they were written.
//!
//! Another pool on the same file may drop both tables. Handles notice through
//! the meta row (or a "no such table" failure) and report
//! [`Error::StoreNotInitialized`].

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragline_core::embedding::{blob_to_vec, vec_to_blob};
use ragline_core::models::{Chunk, ChunkMetadata};
use ragline_core::store::{
    content_hash, rank, CollectionSpec, EmbeddedChunk, MetadataFilter, SearchHit,
    VectorCollection, VectorEngine,
};
use ragline_core::{Error, Result};

use crate::db;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS collection_meta (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS embeddings (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        metadata_json TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        embedding BLOB NOT NULL
    )
    "#,
];

/// Engine bound to one SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    path: PathBuf,
}

impl SqliteEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl VectorEngine for SqliteEngine {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn create(
        &self,
        spec: &CollectionSpec,
        records: &[EmbeddedChunk],
    ) -> Result<Arc<dyn VectorCollection>> {
        let pool = db::connect(&self.path, true).await?;
        let mut tx = pool.begin().await.map_err(Error::storage)?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(Error::storage)?;
        }

        sqlx::query(
            "INSERT OR IGNORE INTO collection_meta (id, model, dims, created_at) VALUES (1, ?, ?, ?)",
        )
        .bind(&spec.model)
        .bind(spec.dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(Error::storage)?;

        // Another writer may have created the collection first.
        let row = sqlx::query("SELECT model, dims FROM collection_meta WHERE id = 1")
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::storage)?;
        let existing = spec_from_row(&row);
        if existing != *spec {
            return Err(Error::Configuration(format!(
                "collection at {} was built with {} ({} dims), not {} ({} dims)",
                self.location(),
                existing.model,
                existing.dims,
                spec.model,
                spec.dims
            )));
        }

        insert_records(&mut *tx, records).await?;
        tx.commit().await.map_err(Error::storage)?;

        Ok(Arc::new(SqliteCollection {
            pool,
            spec: spec.clone(),
        }))
    }

    async fn open(&self) -> Result<Option<Arc<dyn VectorCollection>>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let pool = db::connect(&self.path, false).await?;

        let has_meta = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'collection_meta'",
        )
        .fetch_optional(&pool)
        .await
        .map_err(Error::storage)?
        .is_some();
        if !has_meta {
            pool.close().await;
            return Ok(None);
        }

        let row = sqlx::query("SELECT model, dims FROM collection_meta WHERE id = 1")
            .fetch_optional(&pool)
            .await
            .map_err(Error::storage)?;
        let Some(row) = row else {
            pool.close().await;
            return Ok(None);
        };

        let spec = spec_from_row(&row);
        Ok(Some(Arc::new(SqliteCollection { pool, spec })))
    }
}

fn spec_from_row(row: &SqliteRow) -> CollectionSpec {
    CollectionSpec {
        model: row.get("model"),
        dims: row.get::<i64, _>("dims") as usize,
    }
}

/// Missing tables mean the collection was deleted under this handle.
fn sql_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        if db.message().contains("no such table") {
            return Error::StoreNotInitialized;
        }
    }
    Error::storage(err)
}

async fn insert_records(conn: &mut SqliteConnection, records: &[EmbeddedChunk]) -> Result<()> {
    for record in records {
        let metadata_json = serde_json::to_string(&record.chunk.metadata).map_err(Error::storage)?;
        sqlx::query(
            r#"
            INSERT INTO embeddings (id, content, metadata_json, content_hash, embedding)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&record.chunk.content)
        .bind(&metadata_json)
        .bind(content_hash(&record.chunk.content))
        .bind(vec_to_blob(&record.vector))
        .execute(&mut *conn)
        .await
        .map_err(sql_error)?;
    }
    Ok(())
}

struct SqliteCollection {
    pool: SqlitePool,
    spec: CollectionSpec,
}

impl SqliteCollection {
    /// Fails unless the collection this handle was opened on still exists.
    async fn ensure_current(&self, conn: &mut SqliteConnection) -> Result<()> {
        let row = sqlx::query("SELECT model, dims FROM collection_meta WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await
            .map_err(sql_error)?;
        match row {
            Some(row) if spec_from_row(&row) == self.spec => Ok(()),
            _ => Err(Error::StoreNotInitialized),
        }
    }
}

#[async_trait]
impl VectorCollection for SqliteCollection {
    fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn add(&self, records: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        self.ensure_current(&mut *tx).await?;
        insert_records(&mut *tx, records).await?;
        tx.commit().await.map_err(sql_error)
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        self.ensure_current(&mut *tx).await?;
        let rows = sqlx::query("SELECT content, metadata_json, embedding FROM embeddings ORDER BY seq")
            .fetch_all(&mut *tx)
            .await
            .map_err(sql_error)?;
        tx.commit().await.map_err(Error::storage)?;

        let mut stored: Vec<(Chunk, Vec<f32>)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata =
                serde_json::from_str(&metadata_json).map_err(Error::storage)?;
            let blob: Vec<u8> = row.get("embedding");
            stored.push((
                Chunk {
                    content: row.get("content"),
                    metadata,
                },
                blob_to_vec(&blob),
            ));
        }

        let candidates = stored.iter().map(|(chunk, vec)| (chunk, vec.as_slice()));
        Ok(rank(candidates, query_vec, k, filter))
    }

    async fn persist(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(Error::storage)?;
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        for table in ["embeddings", "collection_meta"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&mut *tx)
                .await
                .map_err(Error::storage)?;
        }
        tx.commit().await.map_err(Error::storage)
    }

    async fn count(&self) -> Result<usize> {
        let mut conn = self.pool.acquire().await.map_err(Error::storage)?;
        self.ensure_current(&mut *conn).await?;
        let row = sqlx::query("SELECT COUNT(*) AS n FROM embeddings")
            .fetch_one(&mut *conn)
            .await
            .map_err(sql_error)?;
        Ok(row.get::<i64, _>("n") as usize)
    }
}
