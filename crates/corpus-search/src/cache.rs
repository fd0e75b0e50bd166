// FIFO-bounded embedding memoization

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::error::EmbeddingError;

/// Default embedding cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Bounded memoization of provider calls, keyed by normalized text.
///
/// Eviction is FIFO by first-insertion order, deliberately not LRU: reads
/// never reorder entries, and overwriting an existing key keeps its
/// original queue position. Entries are idempotent recomputations, so
/// last-write-wins races between concurrent writers are acceptable.
pub struct EmbeddingCache {
    inner: Mutex<FifoState>,
    capacity: usize,
}

struct FifoState {
    map: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

/// Normalize a cache key: trimmed, case-folded text.
fn cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}

impl EmbeddingCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FifoState {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Look up a memoized embedding.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(text);
        let state = self.inner.lock().ok()?;
        state.map.get(&key).cloned()
    }

    /// Insert an embedding, evicting the oldest entry when full.
    pub fn insert(&self, text: &str, embedding: Vec<f32>) {
        let key = cache_key(text);
        let Ok(mut state) = self.inner.lock() else {
            return;
        };

        if state.map.insert(key.clone(), embedding).is_some() {
            // Overwrite keeps the original insertion position
            return;
        }

        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.map.remove(&oldest);
            }
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.map.len()).unwrap_or(0)
    }

    /// True when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.map.clear();
            state.order.clear();
        }
    }
}

/// Provider wrapper combining the cache, a per-call timeout and hit counters.
pub struct CachedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    /// Wrap a provider with a bounded cache and call timeout.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, capacity: usize, timeout: Duration) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::new(capacity),
            timeout,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Embed text, consulting the cache first.
    ///
    /// A provider call that outlives the timeout is reported as
    /// [`EmbeddingError::Unavailable`]; the caller decides whether to
    /// downgrade or surface it.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(embedding) = self.cache.get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(embedding);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let embedding = match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("embedding provider timed out after {:?}", self.timeout);
                return Err(EmbeddingError::Unavailable(format!(
                    "timed out after {:?}",
                    self.timeout
                )));
            }
        };

        self.cache.insert(text, embedding.clone());
        Ok(embedding)
    }

    /// Provider dimensionality.
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Cached entry count.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache hits since startup.
    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses since startup.
    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
