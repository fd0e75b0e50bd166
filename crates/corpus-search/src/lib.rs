//! corpus-search - Hybrid Search Pipeline
//!
//! Embedding providers with a bounded FIFO cache, cosine similarity
//! ranking, an in-memory vector index behind a capability probe, and the
//! hybrid ranker that fuses keyword relevance with semantic similarity.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Bounded FIFO embedding cache and the caching embedder.
pub mod cache;
/// Embedding provider trait and the HTTP-backed implementation.
pub mod embedding;
/// Search error taxonomy.
pub mod error;
/// Keyword + vector fusion pipeline.
pub mod hybrid;
/// In-memory vector index and the ranked-query capability.
pub mod index;
/// Cosine similarity, similarity ranking, and running stats.
pub mod similarity;
/// Result snippets with term highlighting.
pub mod snippet;
/// Deterministic embedding provider for tests and local runs.
pub mod testing;

pub use cache::{CachedEmbedder, EmbeddingCache, DEFAULT_CACHE_CAPACITY};
pub use embedding::{prepare_text, EmbeddingProvider, HttpEmbeddingProvider};
pub use error::{EmbeddingError, SearchError};
pub use hybrid::{
    HybridRanker, HybridSearchOutcome, HybridWeights, RankedResult, SearchMode, SearchOptions,
    SearchSuggestion, DEFAULT_CONTENT_TYPES,
};
pub use index::{RankedQuery, VectorIndex};
pub use similarity::{
    cosine_similarity, similarity_search, SearchStats, SimilarityHit, StatsSnapshot,
};
pub use snippet::{generate_snippet, DEFAULT_SNIPPET_LEN};
