// Search error taxonomy

use corpus_store::StoreError;
use thiserror::Error;

/// Errors from the embedding provider boundary.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Provider errored, timed out, or is not configured.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// Input cannot be embedded (empty after normalization).
    #[error("invalid embedding input: {0}")]
    InvalidInput(String),

    /// Provider returned a vector of the wrong dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured dimensionality
        expected: usize,
        /// Returned dimensionality
        got: usize,
    },
}

/// Errors surfaced by the search pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Empty or malformed query; user error, never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding failure that could not be recovered by downgrading.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Content store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
