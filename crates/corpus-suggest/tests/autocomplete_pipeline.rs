// End-to-end autocomplete pipeline over a real SQLite store
//
// Exercises the public crate surface only: store setup, capability
// probe, source prioritization, caching and cache clearing.

use std::sync::Arc;
use std::time::Duration;

use corpus_search::testing::MockEmbeddingProvider;
use corpus_search::{CachedEmbedder, EmbeddingProvider, RankedQuery};
use corpus_store::{
    all_embeddings, log_query, upsert_record, ContentRecord, NewQueryLogEntry, Storage,
    StorageConfig, StorePool,
};
use corpus_suggest::{
    AutocompleteEngine, SuggestOptions, SuggestionCache, SuggestionSource,
};
use tempfile::NamedTempFile;

fn record(id: &str, title: &str, content_type: &str, embedding: Option<Vec<f32>>) -> ContentRecord {
    ContentRecord {
        id: id.to_string(),
        title: title.to_string(),
        body: format!("{title} describes an architectural choice."),
        content_type: content_type.to_string(),
        tags: Vec::new(),
        metadata: serde_json::Map::new(),
        embedding,
        created_at: 1_700_000_000,
        updated_at: 1_700_000_000,
    }
}

struct Pipeline {
    engine: AutocompleteEngine,
    pool: StorePool,
    _db: NamedTempFile,
}

async fn pipeline(records: Vec<ContentRecord>, provider: MockEmbeddingProvider) -> Pipeline {
    let db = NamedTempFile::new().unwrap();
    let config = StorageConfig {
        db_path: db.path().display().to_string(),
        ..StorageConfig::default()
    };
    {
        let storage = Storage::open_with_config(config.clone()).unwrap();
        for item in &records {
            upsert_record(storage.conn(), item, None).unwrap();
        }
    }
    let pool = StorePool::open_with(config, 4, Duration::from_secs(1)).unwrap();

    let dimension = provider.dimension();
    let embedder = Arc::new(CachedEmbedder::new(
        Arc::new(provider),
        1000,
        Duration::from_secs(1),
    ));
    let embeddings = pool.run(|conn| all_embeddings(conn)).await.unwrap();
    let capability = Arc::new(RankedQuery::probe(true, dimension, embeddings));
    let cache = Arc::new(SuggestionCache::new(Duration::from_secs(300)));

    let engine = AutocompleteEngine::new(pool.clone(), embedder, capability, Arc::clone(&cache));
    Pipeline {
        engine,
        pool,
        _db: db,
    }
}

#[tokio::test]
async fn test_all_sources_contribute_in_priority_order() {
    let provider = MockEmbeddingProvider::new(2)
        .with_vector("deploy", vec![1.0, 0.0]);
    let records = vec![
        record("a", "Deploy checklist", "decision-record", None),
        record("b", "Release gating", "pattern", Some(vec![0.95, 0.05])),
    ];
    let pipeline = pipeline(records, provider).await;

    // History for this user plus enough repeats to trend.
    for _ in 0..3 {
        pipeline
            .pool
            .run(|conn| {
                log_query(
                    conn,
                    &NewQueryLogEntry {
                        query_text: "deploy rollback".to_string(),
                        mode: "hybrid".to_string(),
                        results_found: 2,
                        response_time_ms: 8.0,
                        user_id: Some("u-1".to_string()),
                        project_id: None,
                    },
                )
            })
            .await
            .unwrap();
    }

    let options = SuggestOptions {
        user_id: Some("u-1".to_string()),
        ..SuggestOptions::default()
    };
    let outcome = pipeline.engine.suggest("deploy", &options).await.unwrap();

    assert!(!outcome.cache_hit);
    // direct_match placed first, so it leads the contributing sources.
    assert_eq!(outcome.suggestion_sources.first().unwrap(), "direct_match");
    assert!(outcome
        .suggestions
        .iter()
        .any(|s| s.text == "Deploy checklist"
            && s.sources.contains(&SuggestionSource::DirectMatch)));
    assert!(outcome
        .suggestions
        .iter()
        .any(|s| s.sources.contains(&SuggestionSource::Semantic)));
    assert!(outcome
        .suggestions
        .iter()
        .any(|s| s.text == "deploy rollback"));

    // Scores stay in range and every suggestion names a source.
    for suggestion in &outcome.suggestions {
        assert!((0.0..=1.0).contains(&suggestion.score));
        assert!(!suggestion.sources.is_empty());
    }
}

#[tokio::test]
async fn test_clear_cache_forces_recompute() {
    let pipeline = pipeline(
        vec![record("a", "Cache warmup", "pattern", None)],
        MockEmbeddingProvider::new(2),
    )
    .await;

    let options = SuggestOptions::default();
    pipeline.engine.suggest("cache", &options).await.unwrap();
    let hit = pipeline.engine.suggest("cache", &options).await.unwrap();
    assert!(hit.cache_hit);

    let cleared = pipeline.engine.cache().clear();
    assert!(cleared >= 1);

    let recomputed = pipeline.engine.suggest("cache", &options).await.unwrap();
    assert!(!recomputed.cache_hit);
}

#[tokio::test]
async fn test_suggestions_survive_store_of_queries_without_results() {
    // Queries that found nothing never become history suggestions.
    let pipeline = pipeline(Vec::new(), MockEmbeddingProvider::new(2)).await;
    pipeline
        .pool
        .run(|conn| {
            log_query(
                conn,
                &NewQueryLogEntry {
                    query_text: "fruitless search".to_string(),
                    mode: "hybrid".to_string(),
                    results_found: 0,
                    response_time_ms: 4.0,
                    user_id: Some("u-1".to_string()),
                    project_id: None,
                },
            )
        })
        .await
        .unwrap();

    let options = SuggestOptions {
        user_id: Some("u-1".to_string()),
        include_trending: false,
        ..SuggestOptions::default()
    };
    let outcome = pipeline
        .engine
        .suggest("fruitless", &options)
        .await
        .unwrap();
    assert!(outcome.suggestions.is_empty());
}
