// Cosine similarity and the semantic search engine

use corpus_store::ContentRecord;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cosine similarity between two vectors.
///
/// `dot(a,b) / (‖a‖ * ‖b‖)`, clamped to [-1, 1] to absorb floating-point
/// drift. A zero-norm vector against anything is defined as 0, as is a
/// length mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    // f64 accumulation: f32 sums overflow to inf around 1e19 components,
    // which would turn the ratio into NaN.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for i in 0..a.len() {
        let (x, y) = (f64::from(a[i]), f64::from(b[i]));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if !similarity.is_finite() {
        return 0.0;
    }

    similarity.clamp(-1.0, 1.0) as f32
}

/// A candidate ranked by semantic similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityHit {
    /// Matched record
    pub record: ContentRecord,

    /// Cosine similarity against the query vector
    pub similarity: f32,
}

/// Running counters for the search surface, updated with atomics.
#[derive(Debug, Default)]
pub struct SearchStats {
    searches: AtomicU64,
    total_millis: AtomicU64,
}

/// Point-in-time view of [`SearchStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Searches performed since startup
    pub searches_performed: u64,

    /// Mean end-to-end response time in milliseconds
    pub average_response_ms: f64,
}

impl SearchStats {
    /// Record one completed search.
    pub fn record(&self, elapsed_ms: f64) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.total_millis
            .fetch_add(elapsed_ms.max(0.0).round() as u64, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let searches = self.searches.load(Ordering::Relaxed);
        let total = self.total_millis.load(Ordering::Relaxed);
        StatsSnapshot {
            searches_performed: searches,
            average_response_ms: if searches == 0 {
                0.0
            } else {
                total as f64 / searches as f64
            },
        }
    }
}

/// Rank candidates by cosine similarity against a query vector.
///
/// Candidates without an embedding or below `threshold` are dropped before
/// sorting; ties break toward the most recently created record.
pub fn similarity_search(
    query_vector: &[f32],
    candidates: Vec<ContentRecord>,
    threshold: f32,
    limit: usize,
) -> Vec<SimilarityHit> {
    let mut hits: Vec<SimilarityHit> = candidates
        .into_iter()
        .filter_map(|record| {
            let similarity = record
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(query_vector, embedding))?;
            if similarity >= threshold {
                Some(SimilarityHit { record, similarity })
            } else {
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.record.created_at.cmp(&a.record.created_at))
    });
    hits.truncate(limit);

    hits
}
