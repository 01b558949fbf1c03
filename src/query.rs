//! Nearest-neighbour retrieval over the chunk collection.

use std::collections::BTreeSet;

use crate::error::{OracleError, Result};
use crate::memory::ProjectMemory;
use crate::models::{QueryHit, QueryResponse, StoredHit};
use crate::store::{VectorStore, CHUNK_COLLECTION};

pub struct QueryEngine<'a> {
    store: &'a dyn VectorStore,
    max_k: usize,
    memory: Option<&'a ProjectMemory>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a dyn VectorStore, max_k: usize) -> Self {
        Self {
            store,
            max_k: max_k.max(1),
            memory: None,
        }
    }

    /// Log successful queries to `memory`.
    pub fn with_memory(mut self, memory: &'a ProjectMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Retrieve the `k` nearest chunks (clamped to `1..=max_k`) and the
    /// sorted set of files they come from.
    ///
    /// Fails with [`OracleError::EmptyIndex`] when nothing has been indexed.
    pub async fn query(&self, text: &str, k: usize, insight: Option<&str>) -> Result<QueryResponse> {
        let text = text.trim();
        let hits = self.retrieve(text, k).await?;

        let files = distinct_files(&hits);
        let results = hits
            .into_iter()
            .map(|h| QueryHit {
                content: h.document,
                metadata: h.metadata,
            })
            .collect();

        if let Some(memory) = self.memory {
            if let Err(e) = memory.log(text, &files, insight).await {
                tracing::warn!(error = %e, "failed to log query to project memory");
            }
        }

        Ok(QueryResponse {
            query: text.to_string(),
            results,
            files,
        })
    }

    /// Raw lookup without memory logging.
    pub async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<StoredHit>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OracleError::InvalidInput("query must not be empty".to_string()));
        }
        if self.store.count(CHUNK_COLLECTION).await? == 0 {
            return Err(OracleError::EmptyIndex);
        }

        let k = clamp_k(k, self.max_k);
        tracing::debug!(k, "querying chunk collection");
        self.store.query_text(CHUNK_COLLECTION, text, k).await
    }
}

pub fn clamp_k(k: usize, max_k: usize) -> usize {
    k.clamp(1, max_k.max(1))
}

/// Sorted, de-duplicated `metadata.file` values.
pub fn distinct_files(hits: &[StoredHit]) -> Vec<String> {
    hits.iter()
        .filter_map(|h| h.metadata.get("file").and_then(|f| f.as_str()))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
