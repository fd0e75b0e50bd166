// Deterministic embedding provider for tests
//
// Lives outside #[cfg(test)] so downstream crates can drive the search
// pipeline without a network provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::embedding::EmbeddingProvider;
use crate::error::EmbeddingError;

/// Deterministic, network-free [`EmbeddingProvider`].
///
/// Unknown texts hash to a stable pseudo-vector; fixed vectors can be
/// pinned per text when a test needs exact similarities. A failing variant
/// simulates provider outages.
pub struct MockEmbeddingProvider {
    dimension: usize,
    fixed: HashMap<String, Vec<f32>>,
    fail: bool,
    calls: AtomicU64,
}

impl MockEmbeddingProvider {
    /// Provider returning hash-derived vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: HashMap::new(),
            fail: false,
            calls: AtomicU64::new(0),
        }
    }

    /// Provider that fails every call with `Unavailable`.
    pub fn failing(dimension: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimension)
        }
    }

    /// Pin an exact vector for a text (keyed case-folded).
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.trim().to_lowercase(), vector);
        self
    }

    /// Number of embed calls seen, cache misses included only.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        // FNV-1a seeded walk, normalized to keep similarities in range
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.trim().to_lowercase().bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(0x0000_0100_0000_01b3);
        }

        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            vector.push(((state % 2000) as f32 / 1000.0) - 1.0);
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if self.fail {
            return Err(EmbeddingError::Unavailable(
                "simulated provider outage".to_string(),
            ));
        }

        let key = text.trim().to_lowercase();
        if let Some(vector) = self.fixed.get(&key) {
            return Ok(vector.clone());
        }
        Ok(self.hash_vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let provider = MockEmbeddingProvider::new(8);
        let a = provider.embed("database").await.unwrap();
        let b = provider.embed("database").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_fixed_vector() {
        let provider = MockEmbeddingProvider::new(2).with_vector("Query", vec![1.0, 0.0]);
        assert_eq!(provider.embed("  query ").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let provider = MockEmbeddingProvider::failing(2);
        assert!(provider.embed("anything").await.is_err());
    }
}
