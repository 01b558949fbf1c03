//! In-memory [`VectorStore`] for tests and throwaway indexes.
//!
//! Brute-force cosine similarity over every record in a collection.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{fill_embeddings, rank, VectorStore};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::Result;
use crate::models::{StoredHit, VectorRecord};

type Collection = BTreeMap<String, VectorRecord>;

pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| c.len() as u64))
    }

    async fn replace_file(
        &self,
        collection: &str,
        file: &str,
        mut records: Vec<VectorRecord>,
    ) -> Result<usize> {
        fill_embeddings(self.embedder.as_ref(), &mut records).await?;

        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        coll.retain(|_, r| r.file.as_deref() != Some(file));

        let written = records.len();
        for mut record in records {
            record.file = Some(file.to_string());
            coll.insert(record.id.clone(), record);
        }
        Ok(written)
    }

    async fn add(&self, collection: &str, mut records: Vec<VectorRecord>) -> Result<usize> {
        fill_embeddings(self.embedder.as_ref(), &mut records).await?;

        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        let written = records.len();
        for record in records {
            coll.insert(record.id.clone(), record);
        }
        Ok(written)
    }

    async fn delete_file(&self, collection: &str, file: &str) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = coll.len();
        coll.retain(|_, r| r.file.as_deref() != Some(file));
        Ok((before - coll.len()) as u64)
    }

    async fn files(&self, collection: &str) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let files: BTreeSet<String> = collections
            .get(collection)
            .into_iter()
            .flat_map(|c| c.values())
            .filter_map(|r| r.file.clone())
            .collect();
        Ok(files.into_iter().collect())
    }

    async fn query_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<StoredHit>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let hits = coll
            .values()
            .filter_map(|r| {
                let embedding = r.embedding.as_ref()?;
                Some(StoredHit {
                    id: r.id.clone(),
                    document: r.document.clone(),
                    metadata: r.metadata.clone(),
                    score: cosine_similarity(vector, embedding),
                })
            })
            .collect();
        Ok(rank(hits, k))
    }
}
