//! Error kinds shared by every stage of the ingestion and query paths.
//!
//! Each variant carries a human-readable detail string so the interactive
//! session can show it verbatim. None of them is fatal to the session.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrindaError {
    /// The file extension has no loader.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A supported file could not be read or parsed.
    #[error("failed to load {file}: {reason}")]
    DocumentLoad { file: String, reason: String },

    /// The embedding endpoint could not be reached or refused the request.
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The chat endpoint could not be reached or refused the request.
    #[error("inference service unavailable: {0}")]
    InferenceUnavailable(String),

    /// The requested model is not loaded or not in the configured set.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The server answered, but not with anything we can use.
    #[error("invalid response from inference server: {0}")]
    InvalidResponse(String),

    #[error("vector store write failed: {0}")]
    VectorStoreWriteFailure(String),

    #[error("vector store read failed: {0}")]
    VectorStoreReadFailure(String),

    /// Conversation history could not be read or written.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl OrindaError {
    /// True for the two "endpoint is down" kinds.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            OrindaError::EmbeddingUnavailable(_) | OrindaError::InferenceUnavailable(_)
        )
    }
}

/// Ingestion of one file stopped early.
///
/// `stored` counts the chunks already appended to the vector store before
/// `cause` occurred; those chunks stay in the store.
#[derive(Debug, Clone, Error)]
#[error("ingestion of {} stopped after {stored} chunk(s): {cause}", file.display())]
pub struct IngestFailure {
    pub file: PathBuf,
    pub stored: usize,
    #[source]
    pub cause: OrindaError,
}

impl IngestFailure {
    pub fn new(file: impl Into<PathBuf>, stored: usize, cause: OrindaError) -> Self {
        Self {
            file: file.into(),
            stored,
            cause,
        }
    }
}
