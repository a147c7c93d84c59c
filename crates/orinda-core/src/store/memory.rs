//! In-memory [`VectorStore`] implementation for tests and ephemeral sessions.
//!
//! Chunks live in a `Vec` behind `std::sync::RwLock`, so insertion order is
//! the vector order. Search is brute-force cosine similarity.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::OrindaError;
use crate::models::{DocumentChunk, RetrievalResult, SourceSummary};

use super::{rank_by_score, validated_embedding, VectorStore};

/// In-memory store.
pub struct InMemoryVectorStore {
    dims: usize,
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryVectorStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            chunks: RwLock::new(Vec::new()),
        }
    }

    fn poisoned(what: &str) -> OrindaError {
        OrindaError::VectorStoreReadFailure(format!("{} lock poisoned", what))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn add(&self, chunk: &DocumentChunk) -> Result<(), OrindaError> {
        validated_embedding(chunk, self.dims)?;
        let mut chunks = self
            .chunks
            .write()
            .map_err(|_| OrindaError::VectorStoreWriteFailure("chunk lock poisoned".into()))?;
        chunks.push(chunk.clone());
        Ok(())
    }

    async fn nearest(
        &self,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, OrindaError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let chunks = self.chunks.read().map_err(|_| Self::poisoned("chunk"))?;
        let mut results: Vec<RetrievalResult> = chunks
            .iter()
            .filter_map(|c| {
                let embedding = c.embedding.as_deref()?;
                Some(RetrievalResult {
                    score: cosine_similarity(query_vec, embedding),
                    chunk: c.clone(),
                })
            })
            .collect();
        rank_by_score(&mut results);
        results.truncate(k);
        Ok(results)
    }

    async fn count(&self) -> Result<usize, OrindaError> {
        Ok(self.chunks.read().map_err(|_| Self::poisoned("chunk"))?.len())
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>, OrindaError> {
        let chunks = self.chunks.read().map_err(|_| Self::poisoned("chunk"))?;
        let mut summaries: Vec<SourceSummary> = Vec::new();
        for c in chunks.iter() {
            match summaries.iter_mut().find(|s| s.source_file == c.source_file) {
                Some(s) => s.chunk_count += 1,
                None => summaries.push(SourceSummary {
                    source_file: c.source_file.clone(),
                    chunk_count: 1,
                }),
            }
        }
        Ok(summaries)
    }

    async fn delete_source(&self, source_file: &str) -> Result<usize, OrindaError> {
        let mut chunks = self
            .chunks
            .write()
            .map_err(|_| OrindaError::VectorStoreWriteFailure("chunk lock poisoned".into()))?;
        let before = chunks.len();
        chunks.retain(|c| c.source_file != source_file);
        Ok(before - chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: i64, embedding: Option<Vec<f32>>) -> DocumentChunk {
        DocumentChunk {
            id: format!("{}-{}", source, index),
            text: format!("chunk {} of {}", index, source),
            source_file: source.to_string(),
            chunk_index: index,
            hash: String::new(),
            embedding,
        }
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_sized_embeddings() {
        let store = InMemoryVectorStore::new(3);
        let err = store.add(&chunk("a", 0, None)).await.unwrap_err();
        assert!(matches!(err, OrindaError::VectorStoreWriteFailure(_)));
        let err = store
            .add(&chunk("a", 0, Some(vec![1.0, 0.0])))
            .await
            .unwrap_err();
        assert!(matches!(err, OrindaError::VectorStoreWriteFailure(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn nearest_orders_by_score_then_insertion() {
        let store = InMemoryVectorStore::new(2);
        store.add(&chunk("a", 0, Some(vec![0.0, 1.0]))).await.unwrap();
        store.add(&chunk("a", 1, Some(vec![1.0, 0.0]))).await.unwrap();
        store.add(&chunk("b", 0, Some(vec![2.0, 0.0]))).await.unwrap();

        let results = store.nearest(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a-1", "b-0", "a-0"]);
        assert!((results[0].score - results[1].score).abs() < 1e-6);

        let top = store.nearest(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert!(store.nearest(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sources_and_delete() {
        let store = InMemoryVectorStore::new(1);
        store.add(&chunk("a", 0, Some(vec![1.0]))).await.unwrap();
        store.add(&chunk("b", 0, Some(vec![1.0]))).await.unwrap();
        store.add(&chunk("a", 1, Some(vec![1.0]))).await.unwrap();

        let sources = store.sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_file, "a");
        assert_eq!(sources[0].chunk_count, 2);

        assert_eq!(store.delete_source("a").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.delete_source("missing").await.unwrap(), 0);
    }
}
