//! SQLite-backed [`VectorStore`].
//!
//! Embeddings are stored as little-endian `f32` BLOBs (see
//! [`vec_to_blob`]); similarity search loads a collection's vectors and
//! scores them with cosine similarity in Rust.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::{fill_embeddings, rank, VectorStore};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::error::Result;
use crate::models::{StoredHit, VectorRecord};
use crate::migrate;

/// Database file name inside the index directory.
pub const DB_FILE: &str = "vectors.sqlite";

pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteVectorStore {
    /// Open the store at `<index_dir>/vectors.sqlite`, running migrations.
    pub async fn open(index_dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let options = SqliteConnectOptions::new()
            .filename(index_dir.join(DB_FILE))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // A CLI build and a running server may share one index.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool, embedder })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        collection: &str,
        record: &VectorRecord,
        file: Option<&str>,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let blob = record.embedding.as_deref().map(vec_to_blob);
        let dims = record.embedding.as_ref().map_or(0, Vec::len) as i64;

        sqlx::query(
            r#"
            INSERT INTO vector_records
                (collection, id, file, document, metadata_json, embedding, dims, model, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                file = excluded.file,
                document = excluded.document,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding,
                dims = excluded.dims,
                model = excluded.model,
                created_at = excluded.created_at
            "#,
        )
        .bind(collection)
        .bind(&record.id)
        .bind(file)
        .bind(&record.document)
        .bind(metadata_json)
        .bind(blob)
        .bind(dims)
        .bind(self.embedder.model_name())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn replace_file(
        &self,
        collection: &str,
        file: &str,
        mut records: Vec<VectorRecord>,
    ) -> Result<usize> {
        // Embed before opening the transaction so no lock is held across
        // a provider call.
        fill_embeddings(self.embedder.as_ref(), &mut records).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM vector_records WHERE collection = ? AND file = ?")
            .bind(collection)
            .bind(file)
            .execute(&mut *tx)
            .await?;

        for record in &records {
            self.insert(&mut tx, collection, record, Some(file)).await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    async fn add(&self, collection: &str, mut records: Vec<VectorRecord>) -> Result<usize> {
        fill_embeddings(self.embedder.as_ref(), &mut records).await?;

        let mut tx = self.pool.begin().await?;
        for record in &records {
            self.insert(&mut tx, collection, record, record.file.as_deref())
                .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn delete_file(&self, collection: &str, file: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM vector_records WHERE collection = ? AND file = ?")
            .bind(collection)
            .bind(file)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn files(&self, collection: &str) -> Result<Vec<String>> {
        let files: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT file FROM vector_records WHERE collection = ? AND file IS NOT NULL ORDER BY file",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn query_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<StoredHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document, metadata_json, embedding
            FROM vector_records
            WHERE collection = ? AND embedding IS NOT NULL
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                StoredHit {
                    id: row.get("id"),
                    document: row.get("document"),
                    metadata: serde_json::from_str(&metadata_json)
                        .unwrap_or(serde_json::Value::Null),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(hits, k))
    }
}
