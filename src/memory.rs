//! Project memory: an append-only log of queries and the files they hit.
//!
//! Entries live in their own collection of the vector store. Reading the
//! "state" is a semantic query with a fixed prompt, so it approximates recent
//! activity by similarity rather than returning a chronological tail.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{MemoryEntry, VectorRecord};
use crate::store::{VectorStore, MEMORY_COLLECTION};

pub struct ProjectMemory {
    store: Arc<dyn VectorStore>,
    state_query: String,
}

impl ProjectMemory {
    pub fn new(store: Arc<dyn VectorStore>, state_query: impl Into<String>) -> Self {
        Self {
            store,
            state_query: state_query.into(),
        }
    }

    /// Append an entry. Returns its id.
    pub async fn log(&self, query: &str, files: &[String], insight: Option<&str>) -> Result<String> {
        let now = chrono::Utc::now();
        let entry = MemoryEntry {
            query: query.to_string(),
            files: files.to_vec(),
            insight: insight.map(str::to_string),
            timestamp: now.to_rfc3339(),
        };

        let id = format!(
            "mem-{}-{}",
            now.timestamp_nanos_opt().unwrap_or_default(),
            uuid::Uuid::new_v4()
        );
        let record = VectorRecord {
            id: id.clone(),
            file: None,
            document: render(&entry),
            metadata: serde_json::to_value(&entry)?,
            embedding: None,
        };

        self.store.add(MEMORY_COLLECTION, vec![record]).await?;
        tracing::debug!(id = %id, files = files.len(), "memory entry logged");
        Ok(id)
    }

    /// The `k` entries closest to the canned state prompt.
    pub async fn get_state(&self, k: usize) -> Result<Vec<MemoryEntry>> {
        if self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .store
            .query_text(MEMORY_COLLECTION, &self.state_query, k.max(1))
            .await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| match serde_json::from_value(hit.metadata) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(id = %hit.id, error = %e, "malformed memory entry");
                    None
                }
            })
            .collect())
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count(MEMORY_COLLECTION).await
    }
}

fn render(entry: &MemoryEntry) -> String {
    let files = if entry.files.is_empty() {
        "(none)".to_string()
    } else {
        entry.files.join(", ")
    };
    format!(
        "Query: {}\nFiles: {}\nInsight: {}\nAt: {}",
        entry.query,
        files,
        entry.insight.as_deref().unwrap_or("-"),
        entry.timestamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::store::InMemoryVectorStore;

    fn memory() -> ProjectMemory {
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(HashProvider::new(64))));
        ProjectMemory::new(store, "project overview and decisions")
    }

    #[tokio::test]
    async fn rapid_logs_get_distinct_ids() {
        let memory = memory();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..50 {
            ids.insert(memory.log("same query", &[], None).await.unwrap());
        }
        assert_eq!(ids.len(), 50);
        assert_eq!(memory.count().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn get_state_returns_entries() {
        let memory = memory();
        memory
            .log(
                "where are project decisions recorded",
                &["docs/adr.md".to_string()],
                Some("ADRs live in docs/"),
            )
            .await
            .unwrap();

        let state = memory.get_state(5).await.unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state[0].files, vec!["docs/adr.md".to_string()]);
        assert_eq!(state[0].insight.as_deref(), Some("ADRs live in docs/"));
        assert!(chrono::DateTime::parse_from_rfc3339(&state[0].timestamp).is_ok());
    }

    #[tokio::test]
    async fn get_state_empty_log() {
        assert!(memory().get_state(3).await.unwrap().is_empty());
    }

    #[test]
    fn render_lists_files() {
        let entry = MemoryEntry {
            query: "q".into(),
            files: vec!["a.rs".into(), "b.rs".into()],
            insight: None,
            timestamp: "t".into(),
        };
        assert_eq!(render(&entry), "Query: q\nFiles: a.rs, b.rs\nInsight: -\nAt: t");
    }
}
