// In-memory vector index and the per-deployment ranked-query capability

use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::similarity::cosine_similarity;

/// Vector index errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Provided embedding does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Index dimensionality
        expected: usize,
        /// Rejected vector length
        got: usize,
    },
}

/// Nearest-neighbor index over record embeddings.
///
/// Brute-force cosine scan; sufficient for the corpus sizes this service
/// holds, and the seam where an ANN structure would plug in.
#[derive(Debug, Default)]
pub struct VectorIndex {
    embeddings: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            embeddings: HashMap::new(),
            dimension,
        }
    }

    /// Insert a record embedding.
    pub fn insert(&mut self, record_id: String, embedding: Vec<f32>) -> Result<(), IndexError> {
        if embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        self.embeddings.insert(record_id, embedding);
        Ok(())
    }

    /// Top-k most similar record ids for a query vector, descending.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        if query.len() != self.dimension {
            return Vec::new();
        }

        let mut results: Vec<(String, f32)> = self
            .embeddings
            .iter()
            .map(|(id, embedding)| (id.clone(), cosine_similarity(query, embedding)))
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    /// Embedding for a record id, if indexed.
    pub fn get(&self, record_id: &str) -> Option<&Vec<f32>> {
        self.embeddings.get(record_id)
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Index dimensionality.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Per-deployment ranked-query capability, probed once at startup.
///
/// Deployments without a nearest-neighbor index run `TextOnly`: the vector
/// operation is absent, not merely slow, and search responses are marked
/// degraded. The capability is never re-checked per request.
pub enum RankedQuery {
    /// Vector similarity queries are available through the index.
    VectorCapable(VectorIndex),
    /// Keyword queries only.
    TextOnly,
}

impl RankedQuery {
    /// Build the capability from startup state.
    ///
    /// The index is only considered present when it is enabled for the
    /// deployment and at least one stored embedding exists to serve.
    pub fn probe(
        enabled: bool,
        dimension: usize,
        embeddings: Vec<(String, Vec<f32>)>,
    ) -> Self {
        if !enabled {
            info!("vector index disabled for this deployment, keyword-only ranking");
            return Self::TextOnly;
        }

        let mut index = VectorIndex::new(dimension);
        let mut skipped = 0usize;
        for (id, embedding) in embeddings {
            if index.insert(id, embedding).is_err() {
                skipped += 1;
            }
        }

        if skipped > 0 {
            tracing::warn!("skipped {skipped} embeddings with mismatched dimensionality");
        }

        if index.is_empty() {
            info!("no stored embeddings, falling back to keyword-only ranking");
            return Self::TextOnly;
        }

        info!("vector index ready with {} embeddings", index.len());
        Self::VectorCapable(index)
    }

    /// Whether vector queries are available.
    pub fn is_vector_capable(&self) -> bool {
        matches!(self, Self::VectorCapable(_))
    }

    /// Run a vector query, or `None` when the capability is absent.
    pub fn vector_search(&self, query: &[f32], top_k: usize) -> Option<Vec<(String, f32)>> {
        match self {
            Self::VectorCapable(index) => Some(index.search(query, top_k)),
            Self::TextOnly => None,
        }
    }

    /// Embedding for an indexed record, when the capability is present.
    pub fn embedding_of(&self, record_id: &str) -> Option<&Vec<f32>> {
        match self {
            Self::VectorCapable(index) => index.get(record_id),
            Self::TextOnly => None,
        }
    }
}
