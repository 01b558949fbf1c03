//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only storage seam the pipeline sees.
//! Records live in named collections (`code_chunks`, `project_memory`) and
//! are keyed by `(collection, id)`. Records with a `file` can be replaced or
//! deleted per file, which is how reindexing avoids orphaned chunk ids.
//!
//! A store owns an [`EmbeddingProvider`]: records handed over without an
//! embedding are embedded by the store in one batch, and text queries are
//! embedded with the same provider so query and document vectors agree.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteVectorStore`] | persistent index under the index directory |
//! | [`memory::InMemoryVectorStore`] | tests and throwaway indexes |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{OracleError, Result};
use crate::models::{StoredHit, VectorRecord};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Collection holding code chunks.
pub const CHUNK_COLLECTION: &str = "code_chunks";
/// Collection holding the project memory log.
pub const MEMORY_COLLECTION: &str = "project_memory";

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Provider used for records without a precomputed embedding and for
    /// text queries.
    fn embedder(&self) -> &Arc<dyn EmbeddingProvider>;

    /// Number of records in `collection`.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Atomically replace every record of `file` in `collection` with
    /// `records`. Returns the number written.
    async fn replace_file(
        &self,
        collection: &str,
        file: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize>;

    /// Insert or overwrite records by id.
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize>;

    /// Remove every record of `file`. Returns the number removed.
    async fn delete_file(&self, collection: &str, file: &str) -> Result<u64>;

    /// Distinct, sorted file paths with records in `collection`.
    async fn files(&self, collection: &str) -> Result<Vec<String>>;

    /// The `k` records most similar to `vector`, best first.
    async fn query_vector(&self, collection: &str, vector: &[f32], k: usize)
        -> Result<Vec<StoredHit>>;

    /// Embed `text` and run [`query_vector`](VectorStore::query_vector).
    async fn query_text(&self, collection: &str, text: &str, k: usize) -> Result<Vec<StoredHit>> {
        let vector = embed_query(self.embedder().as_ref(), text)
            .await
            .map_err(OracleError::Embedding)?;
        self.query_vector(collection, &vector, k).await
    }
}

/// Embed, in a single provider call, every record that arrived without a
/// vector.
pub async fn fill_embeddings(
    embedder: &dyn EmbeddingProvider,
    records: &mut [VectorRecord],
) -> Result<()> {
    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.embedding.is_none())
        .map(|(i, _)| i)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = missing.iter().map(|&i| records[i].document.clone()).collect();
    let vectors = embedder.embed(&texts).await.map_err(OracleError::Embedding)?;
    if vectors.len() != texts.len() {
        return Err(OracleError::Embedding(anyhow::anyhow!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }

    for (i, vector) in missing.into_iter().zip(vectors) {
        records[i].embedding = Some(vector);
    }
    Ok(())
}

/// Sort by descending score, ties broken by id, and keep the top `k`.
pub(crate) fn rank(mut hits: Vec<StoredHit>, k: usize) -> Vec<StoredHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;

    fn hit(id: &str, score: f32) -> StoredHit {
        StoredHit {
            id: id.to_string(),
            document: String::new(),
            metadata: serde_json::Value::Null,
            score,
        }
    }

    #[test]
    fn rank_orders_by_score_then_id() {
        let ranked = rank(vec![hit("b", 0.5), hit("c", 0.9), hit("a", 0.5)], 2);
        let ids: Vec<_> = ranked.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn fill_embeddings_only_touches_missing() {
        let provider = HashProvider::new(8);
        let mut records = vec![
            VectorRecord {
                id: "x".into(),
                file: None,
                document: "alpha".into(),
                metadata: serde_json::json!({}),
                embedding: Some(vec![9.0; 8]),
            },
            VectorRecord {
                id: "y".into(),
                file: None,
                document: "beta".into(),
                metadata: serde_json::json!({}),
                embedding: None,
            },
        ];
        fill_embeddings(&provider, &mut records).await.unwrap();
        assert_eq!(records[0].embedding.as_deref(), Some(&[9.0; 8][..]));
        assert_eq!(records[1].embedding.as_ref().map(Vec::len), Some(8));
    }
}
