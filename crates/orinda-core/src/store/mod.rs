//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the operations the ingestion and
//! retrieval paths need, enabling pluggable backends (SQLite on disk,
//! in-memory for tests).
//!
//! # Invariants
//!
//! - Every stored chunk has an embedding of exactly [`VectorStore::dims`]
//!   components. [`VectorStore::add`] rejects anything else with
//!   [`OrindaError::VectorStoreWriteFailure`].
//! - Stored chunks are never updated. Adding a chunk whose text was stored
//!   before creates a second, independent record.
//! - [`VectorStore::nearest`] orders by descending cosine similarity; equal
//!   scores keep insertion order.

pub mod memory;

use async_trait::async_trait;

use crate::error::OrindaError;
use crate::models::{DocumentChunk, RetrievalResult, SourceSummary};

/// Abstract storage backend for embedded chunks.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorStore::add) | Append one embedded chunk |
/// | [`nearest`](VectorStore::nearest) | Top-k cosine similarity search |
/// | [`count`](VectorStore::count) | Number of stored chunks |
/// | [`sources`](VectorStore::sources) | Per-file chunk counts |
/// | [`delete_source`](VectorStore::delete_source) | Drop every chunk of one file |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimensionality every stored embedding must have.
    fn dims(&self) -> usize;

    /// Append a chunk. The chunk must carry an embedding.
    async fn add(&self, chunk: &DocumentChunk) -> Result<(), OrindaError>;

    /// Return the `k` chunks most similar to `query_vec`.
    async fn nearest(&self, query_vec: &[f32], k: usize)
        -> Result<Vec<RetrievalResult>, OrindaError>;

    async fn count(&self) -> Result<usize, OrindaError>;

    /// Files with stored chunks, in first-ingested order.
    async fn sources(&self) -> Result<Vec<SourceSummary>, OrindaError>;

    /// Delete every chunk from `source_file`; returns how many were removed.
    async fn delete_source(&self, source_file: &str) -> Result<usize, OrindaError>;
}

/// Check a chunk against the store's dimensionality before writing it.
///
/// Returns the embedding so backends can serialize it without unwrapping.
pub fn validated_embedding(chunk: &DocumentChunk, dims: usize) -> Result<&[f32], OrindaError> {
    let embedding = chunk.embedding.as_deref().ok_or_else(|| {
        OrindaError::VectorStoreWriteFailure(format!(
            "chunk {} of {} has no embedding",
            chunk.chunk_index, chunk.source_file
        ))
    })?;
    if embedding.len() != dims {
        return Err(OrindaError::VectorStoreWriteFailure(format!(
            "embedding has {} dimensions, store expects {}",
            embedding.len(),
            dims
        )));
    }
    Ok(embedding)
}

/// Sort by descending score. `sort_by` is stable, so callers that pass
/// candidates in insertion order get insertion order among ties.
pub fn rank_by_score(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
