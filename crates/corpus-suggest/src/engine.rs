// Four-source autocomplete with response caching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use corpus_search::{CachedEmbedder, RankedQuery};
use corpus_store::{
    history_queries, log_query, lookup_many, popular_titles, title_matches, trending_queries,
    ContentFilter, NewQueryLogEntry, StorePool,
};

use crate::cache::{CachedSuggestions, SuggestionCache};
use crate::error::SuggestError;
use crate::types::{AutocompleteOutcome, SuggestOptions, Suggestion, SuggestionSource};

/// Shortest partial that triggers the semantic source.
const SEMANTIC_MIN_LEN: usize = 3;

/// Lookback window for the caller-history source, in days.
const HISTORY_WINDOW_DAYS: i64 = 30;

/// Lookback window for the trending source, in days.
const TRENDING_WINDOW_DAYS: i64 = 7;

/// A query must repeat at least this often inside the window to trend.
const TRENDING_MIN_COUNT: i64 = 2;

const PREFIX_MATCH_SCORE: f32 = 0.9;
const SUBSTRING_MATCH_SCORE: f32 = 0.7;
const HISTORY_SCORE: f32 = 0.65;
const TRENDING_SCORE_CEILING: f32 = 0.6;
const TITLE_PADDING_SCORE: f32 = 0.3;

/// Fills suggestion slots in source priority order.
///
/// A text placed by an earlier source is never evicted; a later source
/// producing the same text merges into it, unioning `sources` and keeping
/// the higher score.
struct SlotFiller {
    suggestions: Vec<Suggestion>,
    by_text: HashMap<String, usize>,
    source_order: Vec<SuggestionSource>,
    limit: usize,
}

impl SlotFiller {
    fn new(limit: usize) -> Self {
        Self {
            suggestions: Vec::new(),
            by_text: HashMap::new(),
            source_order: Vec::new(),
            limit,
        }
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.suggestions.len())
    }

    fn place(
        &mut self,
        text: String,
        kind: String,
        score: f32,
        source: SuggestionSource,
        metadata: serde_json::Value,
    ) {
        let score = score.clamp(0.0, 1.0);
        if let Some(&index) = self.by_text.get(&text) {
            let existing = &mut self.suggestions[index];
            if !existing.sources.contains(&source) {
                existing.sources.push(source);
            }
            existing.score = existing.score.max(score);
            self.note_source(source);
            return;
        }

        if self.suggestions.len() >= self.limit {
            return;
        }

        self.by_text.insert(text.clone(), self.suggestions.len());
        self.suggestions.push(Suggestion {
            text,
            kind,
            score,
            sources: vec![source],
            metadata,
        });
        self.note_source(source);
    }

    fn note_source(&mut self, source: SuggestionSource) {
        if !self.source_order.contains(&source) {
            self.source_order.push(source);
        }
    }

    fn finish(self) -> (Vec<Suggestion>, Vec<String>) {
        let sources = self
            .source_order
            .into_iter()
            .map(|source| source.as_str().to_string())
            .collect();
        (self.suggestions, sources)
    }
}

/// Autocomplete over four prioritized sources with a TTL response cache.
pub struct AutocompleteEngine {
    pool: StorePool,
    embedder: Arc<CachedEmbedder>,
    capability: Arc<RankedQuery>,
    cache: Arc<SuggestionCache>,
}

impl AutocompleteEngine {
    /// Assemble the engine from startup state.
    pub fn new(
        pool: StorePool,
        embedder: Arc<CachedEmbedder>,
        capability: Arc<RankedQuery>,
        cache: Arc<SuggestionCache>,
    ) -> Self {
        Self {
            pool,
            embedder,
            capability,
            cache,
        }
    }

    /// Response cache handle, shared with the clear-cache endpoint.
    pub fn cache(&self) -> Arc<SuggestionCache> {
        Arc::clone(&self.cache)
    }

    /// Produce suggestions for a partial query.
    ///
    /// An empty partial runs trending-only mode. Non-empty partials fill
    /// slots from direct title matches, then the semantic, history and
    /// trending sources in that order; the optional sources swallow their
    /// own failures and only narrow the result.
    pub async fn suggest(
        &self,
        partial: &str,
        options: &SuggestOptions,
    ) -> Result<AutocompleteOutcome, SuggestError> {
        let started = Instant::now();
        let trimmed = partial.trim();
        let folded = trimmed.to_lowercase();
        let cache_key = SuggestionCache::cache_key(&folded, options);

        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(AutocompleteOutcome {
                query: trimmed.to_string(),
                suggestions: cached.suggestions,
                suggestion_sources: cached.sources,
                cache_hit: true,
            });
        }

        let mut filler = SlotFiller::new(options.limit.max(1));

        if folded.is_empty() {
            // Trending-only mode has a single source, so its store errors
            // surface instead of degrading to an empty response.
            self.fill_trending(&mut filler, "", true).await?;
        } else {
            self.fill_direct_matches(&mut filler, &folded, options)
                .await?;

            if options.include_semantic
                && folded.len() >= SEMANTIC_MIN_LEN
                && filler.remaining() > 0
            {
                self.fill_semantic(&mut filler, &folded, options).await;
            }

            if options.include_history
                && (options.user_id.is_some() || options.project_id.is_some())
                && filler.remaining() > 0
            {
                self.fill_history(&mut filler, &folded, options).await;
            }

            if options.include_trending && filler.remaining() > 0 {
                if let Err(err) = self.fill_trending(&mut filler, &folded, false).await {
                    warn!("trending suggestions unavailable: {err}");
                }
            }
        }

        let (suggestions, suggestion_sources) = filler.finish();
        self.cache.insert(
            cache_key,
            CachedSuggestions {
                suggestions: suggestions.clone(),
                sources: suggestion_sources.clone(),
            },
        );

        self.spawn_log(NewQueryLogEntry {
            query_text: trimmed.to_string(),
            mode: "autocomplete".to_string(),
            results_found: suggestions.len() as i64,
            response_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            user_id: options.user_id.clone(),
            project_id: options.project_id.clone(),
        });

        Ok(AutocompleteOutcome {
            query: trimmed.to_string(),
            suggestions,
            suggestion_sources,
            cache_hit: false,
        })
    }

    async fn fill_direct_matches(
        &self,
        filler: &mut SlotFiller,
        folded: &str,
        options: &SuggestOptions,
    ) -> Result<(), SuggestError> {
        let limit = filler.remaining();
        let matches = self
            .pool
            .run(|conn| title_matches(conn, folded, options.content_type.as_deref(), limit))
            .await?;

        for matched in matches {
            let score = if matched.prefix {
                PREFIX_MATCH_SCORE
            } else {
                SUBSTRING_MATCH_SCORE
            };
            filler.place(
                matched.title,
                matched.content_type,
                score,
                SuggestionSource::DirectMatch,
                serde_json::json!({ "record_id": matched.id }),
            );
        }
        Ok(())
    }

    async fn fill_semantic(
        &self,
        filler: &mut SlotFiller,
        folded: &str,
        options: &SuggestOptions,
    ) {
        let vector = match self.embedder.embed(folded).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!("semantic suggestions unavailable: {err}");
                return;
            }
        };

        let Some(hits) = self.capability.vector_search(&vector, filler.remaining() * 2) else {
            return;
        };
        if hits.is_empty() {
            return;
        }

        let similarities: HashMap<String, f32> = hits.iter().cloned().collect();
        let ids: Vec<String> = hits.into_iter().map(|(id, _)| id).collect();
        let filter = match &options.content_type {
            Some(content_type) => ContentFilter::for_type(content_type.clone()),
            None => ContentFilter::default(),
        };

        let records = match self.pool.run(|conn| lookup_many(conn, &ids, &filter)).await {
            Ok(records) => records,
            Err(err) => {
                warn!("semantic suggestion hydration failed: {err}");
                return;
            }
        };

        for record in records {
            let score = similarities.get(&record.id).copied().unwrap_or(0.0);
            filler.place(
                record.title,
                record.content_type,
                score,
                SuggestionSource::Semantic,
                serde_json::json!({ "record_id": record.id }),
            );
        }
    }

    async fn fill_history(&self, filler: &mut SlotFiller, folded: &str, options: &SuggestOptions) {
        let limit = filler.remaining();
        let history = self
            .pool
            .run(|conn| {
                history_queries(
                    conn,
                    options.user_id.as_deref(),
                    options.project_id.as_deref(),
                    folded,
                    HISTORY_WINDOW_DAYS,
                    limit,
                )
            })
            .await;

        match history {
            Ok(queries) => {
                for query in queries {
                    filler.place(
                        query,
                        "query".to_string(),
                        HISTORY_SCORE,
                        SuggestionSource::History,
                        serde_json::Value::Null,
                    );
                }
            }
            Err(err) => warn!("history suggestions unavailable: {err}"),
        }
    }

    /// Trending queries, padded with globally popular titles when the
    /// slots are still not full.
    async fn fill_trending(
        &self,
        filler: &mut SlotFiller,
        folded: &str,
        empty_query_mode: bool,
    ) -> Result<(), SuggestError> {
        let fetch = filler.remaining() * 3;
        let trending = self
            .pool
            .run(|conn| trending_queries(conn, TRENDING_WINDOW_DAYS, TRENDING_MIN_COUNT, fetch))
            .await?;

        let max_count = trending.iter().map(|entry| entry.count).max().unwrap_or(1);
        for entry in trending {
            if !empty_query_mode && !entry.query_text.contains(folded) {
                continue;
            }
            let score = TRENDING_SCORE_CEILING * (entry.count as f32 / max_count as f32);
            filler.place(
                entry.query_text,
                "query".to_string(),
                score,
                SuggestionSource::Trending,
                serde_json::json!({ "count": entry.count }),
            );
        }

        // Padding is independent of the partial text by design of the
        // fallback: something popular beats nothing.
        if filler.remaining() > 0 {
            let pad = filler.remaining();
            let titles = self.pool.run(|conn| popular_titles(conn, pad)).await?;
            for title in titles {
                filler.place(
                    title.title,
                    title.content_type,
                    TITLE_PADDING_SCORE,
                    SuggestionSource::Trending,
                    serde_json::json!({ "record_id": title.id }),
                );
            }
        }
        Ok(())
    }

    /// Fire-and-forget query log write. Failures never reach the caller.
    fn spawn_log(&self, entry: NewQueryLogEntry) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(err) = pool.run(|conn| log_query(conn, &entry)).await {
                warn!("autocomplete log write failed: {err}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_search::testing::MockEmbeddingProvider;
    use corpus_search::EmbeddingProvider;
    use corpus_store::{all_embeddings, upsert_record, ContentRecord, Storage, StorageConfig};
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn record_with(
        id: &str,
        title: &str,
        content_type: &str,
        embedding: Option<Vec<f32>>,
    ) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            title: title.to_string(),
            body: format!("{title} body"),
            content_type: content_type.to_string(),
            tags: Vec::new(),
            metadata: serde_json::Map::new(),
            embedding,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    struct Fixture {
        pool: StorePool,
        _db: NamedTempFile,
    }

    async fn fixture_with(records: Vec<ContentRecord>) -> Fixture {
        let db = NamedTempFile::new().unwrap();
        let config = StorageConfig {
            db_path: db.path().display().to_string(),
            ..StorageConfig::default()
        };
        {
            let storage = Storage::open_with_config(config.clone()).unwrap();
            for record in &records {
                upsert_record(storage.conn(), record, None).unwrap();
            }
        }
        let pool = StorePool::open_with(config, 2, Duration::from_secs(1)).unwrap();
        Fixture { pool, _db: db }
    }

    async fn engine_for(
        fixture: &Fixture,
        provider: MockEmbeddingProvider,
        vector_enabled: bool,
        ttl: Duration,
    ) -> AutocompleteEngine {
        let dimension = provider.dimension();
        let embedder = Arc::new(CachedEmbedder::new(
            Arc::new(provider),
            100,
            Duration::from_secs(1),
        ));
        let embeddings = fixture
            .pool
            .run(|conn| all_embeddings(conn))
            .await
            .unwrap();
        let capability = Arc::new(RankedQuery::probe(vector_enabled, dimension, embeddings));
        AutocompleteEngine::new(
            fixture.pool.clone(),
            embedder,
            capability,
            Arc::new(SuggestionCache::new(ttl)),
        )
    }

    async fn seed_queries(fixture: &Fixture, text: &str, times: usize, user_id: Option<&str>) {
        for _ in 0..times {
            fixture
                .pool
                .run(|conn| {
                    log_query(
                        conn,
                        &NewQueryLogEntry {
                            query_text: text.to_string(),
                            mode: "hybrid".to_string(),
                            results_found: 3,
                            response_time_ms: 5.0,
                            user_id: user_id.map(str::to_string),
                            project_id: None,
                        },
                    )
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_direct_match_prefix_outscores_substring() {
        let fixture = fixture_with(vec![
            record_with("a", "Database sharding", "decision-record", None),
            record_with("b", "Sharding the database", "decision-record", None),
        ])
        .await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            false,
            Duration::from_secs(60),
        )
        .await;

        let outcome = engine
            .suggest("database", &SuggestOptions::default())
            .await
            .unwrap();

        let prefix = outcome
            .suggestions
            .iter()
            .find(|s| s.text == "Database sharding")
            .unwrap();
        let substring = outcome
            .suggestions
            .iter()
            .find(|s| s.text == "Sharding the database")
            .unwrap();
        assert!(prefix.score > substring.score);
        assert!(outcome
            .suggestion_sources
            .contains(&"direct_match".to_string()));
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let fixture =
            fixture_with(vec![record_with("a", "Caching", "decision-record", None)]).await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            false,
            Duration::from_secs(60),
        )
        .await;

        let first = engine
            .suggest("caching", &SuggestOptions::default())
            .await
            .unwrap();
        assert!(!first.cache_hit);

        let second = engine
            .suggest("caching", &SuggestOptions::default())
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(
            serde_json::to_value(&first.suggestions).unwrap(),
            serde_json::to_value(&second.suggestions).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cache_expiry_misses() {
        let fixture =
            fixture_with(vec![record_with("a", "Caching", "decision-record", None)]).await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            false,
            Duration::from_millis(5),
        )
        .await;

        engine
            .suggest("caching", &SuggestOptions::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let again = engine
            .suggest("caching", &SuggestOptions::default())
            .await
            .unwrap();
        assert!(!again.cache_hit);
    }

    #[tokio::test]
    async fn test_dedup_merges_sources_and_keeps_max_score() {
        // The same record matches by title and by vector similarity.
        let fixture = fixture_with(vec![record_with(
            "a",
            "retry policy",
            "decision-record",
            Some(vec![1.0, 0.0]),
        )])
        .await;
        let provider =
            MockEmbeddingProvider::new(2).with_vector("retry policy", vec![1.0, 0.0]);
        let engine = engine_for(&fixture, provider, true, Duration::from_secs(60)).await;

        let outcome = engine
            .suggest("retry policy", &SuggestOptions::default())
            .await
            .unwrap();

        let merged: Vec<_> = outcome
            .suggestions
            .iter()
            .filter(|s| s.text == "retry policy")
            .collect();
        assert_eq!(merged.len(), 1);
        assert!(merged[0].sources.contains(&SuggestionSource::DirectMatch));
        assert!(merged[0].sources.contains(&SuggestionSource::Semantic));
        // Semantic similarity 1.0 beats the prefix-match score.
        assert!((merged[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_source_gating_direct_only() {
        let fixture = fixture_with(vec![record_with(
            "a",
            "gated suggestion",
            "decision-record",
            Some(vec![1.0, 0.0]),
        )])
        .await;
        seed_queries(&fixture, "gated suggestion", 3, Some("u-1")).await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            true,
            Duration::from_secs(60),
        )
        .await;

        let options = SuggestOptions {
            include_semantic: false,
            include_history: false,
            include_trending: false,
            user_id: Some("u-1".to_string()),
            ..SuggestOptions::default()
        };
        let outcome = engine.suggest("gated", &options).await.unwrap();
        assert_eq!(outcome.suggestion_sources, vec!["direct_match".to_string()]);
    }

    #[tokio::test]
    async fn test_history_requires_caller_identity() {
        let fixture = fixture_with(Vec::new()).await;
        seed_queries(&fixture, "historic query", 2, Some("u-1")).await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            false,
            Duration::from_secs(60),
        )
        .await;

        let anonymous = SuggestOptions {
            include_trending: false,
            ..SuggestOptions::default()
        };
        let outcome = engine.suggest("historic", &anonymous).await.unwrap();
        assert!(!outcome
            .suggestion_sources
            .contains(&"history".to_string()));

        let identified = SuggestOptions {
            include_trending: false,
            user_id: Some("u-1".to_string()),
            ..SuggestOptions::default()
        };
        let outcome = engine.suggest("historic", &identified).await.unwrap();
        assert!(outcome
            .suggestions
            .iter()
            .any(|s| s.text == "historic query"
                && s.sources.contains(&SuggestionSource::History)));
    }

    #[tokio::test]
    async fn test_empty_partial_serves_trending_only() {
        let fixture = fixture_with(vec![record_with(
            "a",
            "Popular fallback title",
            "pattern",
            None,
        )])
        .await;
        seed_queries(&fixture, "top query", 3, None).await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            false,
            Duration::from_secs(60),
        )
        .await;

        let outcome = engine.suggest("   ", &SuggestOptions::default()).await.unwrap();
        assert_eq!(outcome.suggestion_sources, vec!["trending".to_string()]);
        assert!(outcome.suggestions.iter().any(|s| s.text == "top query"));
        // Short on trending queries, so popular titles pad the slots.
        assert!(outcome
            .suggestions
            .iter()
            .any(|s| s.text == "Popular fallback title"));
    }

    #[tokio::test]
    async fn test_failing_embedder_degrades_to_other_sources() {
        let fixture = fixture_with(vec![record_with(
            "a",
            "resilient autocomplete",
            "decision-record",
            Some(vec![1.0, 0.0]),
        )])
        .await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::failing(2),
            true,
            Duration::from_secs(60),
        )
        .await;

        let outcome = engine
            .suggest("resilient", &SuggestOptions::default())
            .await
            .unwrap();
        assert!(outcome
            .suggestions
            .iter()
            .any(|s| s.text == "resilient autocomplete"));
        assert!(!outcome
            .suggestion_sources
            .contains(&"semantic".to_string()));
    }

    #[tokio::test]
    async fn test_limit_bounds_suggestions() {
        let mut records = Vec::new();
        for i in 0..10 {
            records.push(record_with(
                &format!("r{i}"),
                &format!("widget option {i}"),
                "pattern",
                None,
            ));
        }
        let fixture = fixture_with(records).await;
        let engine = engine_for(
            &fixture,
            MockEmbeddingProvider::new(2),
            false,
            Duration::from_secs(60),
        )
        .await;

        let options = SuggestOptions {
            limit: 3,
            ..SuggestOptions::default()
        };
        let outcome = engine.suggest("widget", &options).await.unwrap();
        assert_eq!(outcome.suggestions.len(), 3);
    }
}
