//! Retrieval orchestration: query → embedding → nearest neighbours →
//! relevance threshold.
//!
//! The algorithm operates entirely through the [`EmbeddingProvider`] and
//! [`VectorStore`] traits. The calling application decides `k` and the
//! threshold (both come from configuration).

use crate::embedding::EmbeddingProvider;
use crate::error::OrindaError;
use crate::models::RetrievalResult;
use crate::store::{rank_by_score, VectorStore};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Number of nearest neighbours requested from the store.
    pub top_k: usize,
    /// Results scoring below this are dropped.
    pub min_score: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.7,
        }
    }
}

/// Retrieve the stored chunks most relevant to `query`.
///
/// Returns at most `params.top_k` results with `score >= params.min_score`,
/// ordered by descending score with ties in insertion order. An empty
/// result is not an error: it is returned for a blank query, `top_k == 0`,
/// an empty store, or when nothing clears the threshold.
///
/// # Errors
///
/// - [`OrindaError::EmbeddingUnavailable`] when the query cannot be embedded.
/// - [`OrindaError::VectorStoreReadFailure`] when the store cannot be read.
pub async fn retrieve(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    query: &str,
    params: &RetrievalParams,
) -> Result<Vec<RetrievalResult>, OrindaError> {
    if query.trim().is_empty() || params.top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed_one(query).await?;
    let mut results = store.nearest(&query_vec, params.top_k).await?;

    results.retain(|r| r.score >= params.min_score);
    rank_by_score(&mut results);
    results.truncate(params.top_k);

    Ok(results)
}
