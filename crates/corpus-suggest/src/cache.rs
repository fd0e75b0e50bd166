// TTL cache for autocomplete responses

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::{SuggestOptions, Suggestion};

/// Default lifetime of a cached autocomplete response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default interval of the background sweep task.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cached value: the suggestions plus the source names that produced them.
#[derive(Debug, Clone)]
pub struct CachedSuggestions {
    /// Suggestions in placement order
    pub suggestions: Vec<Suggestion>,
    /// Distinct contributing source names
    pub sources: Vec<String>,
}

struct CacheSlot {
    value: CachedSuggestions,
    expires_at: Instant,
}

/// Mutex-guarded TTL map for autocomplete responses.
///
/// Expired entries are never served; reads drop them eagerly and a
/// background sweep purges the rest so abandoned keys do not accumulate.
pub struct SuggestionCache {
    entries: Mutex<HashMap<String, CacheSlot>>,
    ttl: Duration,
}

impl SuggestionCache {
    /// Cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Composite cache key: folded text plus every knob that changes the
    /// response. The empty-text trending mode keys separately by design
    /// of the composite.
    pub fn cache_key(folded_partial: &str, options: &SuggestOptions) -> String {
        format!(
            "{}|{}|{}|{}{}{}",
            folded_partial,
            options.content_type.as_deref().unwrap_or(""),
            options.limit,
            u8::from(options.include_semantic),
            u8::from(options.include_history),
            u8::from(options.include_trending),
        )
    }

    /// Unexpired cached value for a key, if any.
    pub fn get(&self, key: &str) -> Option<CachedSuggestions> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(slot) if slot.expires_at > Instant::now() => Some(slot.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value under a key with a fresh TTL. Last write wins.
    pub fn insert(&self, key: String, value: CachedSuggestions) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheSlot {
                    value,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    /// Drop every entry, expired or not. Returns the count removed.
    pub fn clear(&self) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                let cleared = entries.len();
                entries.clear();
                cleared
            }
            Err(_) => 0,
        }
    }

    /// Drop expired entries only. Returns the count removed.
    pub fn purge_expired(&self) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                let now = Instant::now();
                let before = entries.len();
                entries.retain(|_, slot| slot.expires_at > now);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Live entry count, expired entries included until swept.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the periodic sweep task.
    ///
    /// The task holds only a weak handle and exits once the cache itself
    /// is dropped, so it never keeps a shut-down service alive.
    pub fn spawn_sweeper(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!("autocomplete cache sweep purged {purged} entries");
                }
            }
        })
    }
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
