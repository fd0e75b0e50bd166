// Hybrid ranking pipeline: keyword + vector fusion

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use corpus_store::{
    keyword_query, log_query, lookup_by_id, lookup_many, records_with_embeddings, title_matches,
    trending_queries, ContentFilter, ContentRecord, NewQueryLogEntry, StoreError, StorePool,
};

use crate::cache::CachedEmbedder;
use crate::error::SearchError;
use crate::index::RankedQuery;
use crate::similarity::{similarity_search, SearchStats, SimilarityHit};
use crate::snippet::{generate_snippet, DEFAULT_SNIPPET_LEN};

/// Content types searched when a request does not name any.
pub const DEFAULT_CONTENT_TYPES: &[&str] = &["decision-record", "pattern"];

/// Minimum fused result count before supplementary suggestions kick in.
const SUGGESTION_FLOOR: usize = 5;

/// Maximum supplementary suggestions attached to a sparse result set.
const SUGGESTION_CAP: usize = 10;

/// How the pipeline combines its two ranking sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector similarity only.
    Semantic,
    /// Text relevance only.
    Keyword,
    /// Weighted fusion of both.
    Hybrid,
}

impl SearchMode {
    /// Wire name of the mode, as logged and returned to callers.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid
    }
}

/// Relative weights for hybrid fusion. Defaults favor the semantic side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    /// Weight applied to the cosine similarity term.
    pub semantic: f32,
    /// Weight applied to the keyword relevance term.
    pub keyword: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

/// Per-request knobs for [`HybridRanker::search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Requested ranking mode.
    #[serde(default, rename = "search_mode", alias = "mode")]
    pub mode: SearchMode,

    /// Content types to search; empty means [`DEFAULT_CONTENT_TYPES`].
    #[serde(default)]
    pub content_types: Vec<String>,

    /// Minimum cosine similarity for vector candidates.
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,

    /// Result budget across all content types.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Structural filter applied to both ranking sources.
    #[serde(default, rename = "filters", alias = "filter")]
    pub filter: ContentFilter,

    /// Correlation key for the query log.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Correlation key for the query log.
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_threshold() -> f32 {
    0.7
}

fn default_max_results() -> usize {
    20
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            content_types: Vec::new(),
            similarity_threshold: default_threshold(),
            max_results: default_max_results(),
            filter: ContentFilter::default(),
            user_id: None,
            project_id: None,
        }
    }
}

/// One fused search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    /// Record identifier
    pub id: String,

    /// Record title
    pub title: String,

    /// Content kind of the record
    pub content_type: String,

    /// Highlighted body excerpt
    pub snippet: String,

    /// Fused score in [0, 1]
    pub score: f32,

    /// Cosine similarity when the vector source contributed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,

    /// Keyword relevance when the text source contributed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,

    /// Record tags
    pub tags: Vec<String>,

    /// Open metadata mapping
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Record creation time, unix seconds
    pub created_at: i64,
}

/// Supplementary suggestion attached to a sparse result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSuggestion {
    /// Suggested query or title text
    pub text: String,

    /// Why this text was suggested
    pub reason: String,
}

/// Full outcome of one hybrid search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchOutcome {
    /// Query as submitted (trimmed)
    pub query: String,

    /// Mode that actually ran, after any downgrade
    pub search_mode: SearchMode,

    /// True when the semantic path was requested but unavailable
    pub degraded: bool,

    /// Result count across all content types
    pub total_results: usize,

    /// End-to-end processing time in milliseconds
    pub processing_time_ms: f64,

    /// Results grouped by content type
    pub results_by_type: BTreeMap<String, Vec<RankedResult>>,

    /// Supplementary suggestions when results are sparse
    pub search_suggestions: Vec<SearchSuggestion>,
}

struct FusedCandidate {
    record: ContentRecord,
    semantic: Option<f32>,
    keyword: Option<f32>,
}

/// Fusion pipeline over the content store, the embedding cache, and the
/// per-deployment ranked-query capability.
pub struct HybridRanker {
    pool: StorePool,
    embedder: Arc<CachedEmbedder>,
    capability: Arc<RankedQuery>,
    weights: HybridWeights,
    stats: Arc<SearchStats>,
}

impl HybridRanker {
    /// Assemble the pipeline from startup state.
    pub fn new(
        pool: StorePool,
        embedder: Arc<CachedEmbedder>,
        capability: Arc<RankedQuery>,
        weights: HybridWeights,
    ) -> Self {
        Self {
            pool,
            embedder,
            capability,
            weights,
            stats: Arc::new(SearchStats::default()),
        }
    }

    /// Running counters for the health/analytics surface.
    pub fn stats(&self) -> Arc<SearchStats> {
        Arc::clone(&self.stats)
    }

    /// Capability handle shared with the autocomplete engine.
    pub fn capability(&self) -> Arc<RankedQuery> {
        Arc::clone(&self.capability)
    }

    /// Caching embedder handle, shared with the autocomplete engine and
    /// the health surface.
    pub fn embedder(&self) -> Arc<CachedEmbedder> {
        Arc::clone(&self.embedder)
    }

    /// Run one search request end to end.
    ///
    /// Semantic and hybrid requests embed the query first; when the
    /// provider is unavailable the request downgrades to keyword mode and
    /// the outcome is marked degraded, except for semantic-only requests
    /// where the embedding error surfaces. An absent vector index
    /// downgrades the same way, silently.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<HybridSearchOutcome, SearchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let mut degraded = false;
        let mut effective_mode = options.mode;
        let mut query_vector: Option<Vec<f32>> = None;

        if effective_mode != SearchMode::Keyword {
            if !self.capability.is_vector_capable() {
                debug!("vector index absent, running keyword-only");
                degraded = true;
                effective_mode = SearchMode::Keyword;
            } else {
                match self.embedder.embed(trimmed).await {
                    Ok(vector) => query_vector = Some(vector),
                    Err(err) if effective_mode == SearchMode::Semantic => {
                        return Err(err.into());
                    }
                    Err(err) => {
                        warn!("embedding failed, downgrading to keyword mode: {err}");
                        degraded = true;
                        effective_mode = SearchMode::Keyword;
                    }
                }
            }
        }

        let content_types: Vec<String> = if options.content_types.is_empty() {
            DEFAULT_CONTENT_TYPES.iter().map(|t| t.to_string()).collect()
        } else {
            options.content_types.clone()
        };

        // Integer floor; any remainder of the budget is dropped, and a
        // budget below the type count yields zero slots per type.
        let per_type_limit = options.max_results / content_types.len();

        let mut results_by_type: BTreeMap<String, Vec<RankedResult>> = BTreeMap::new();
        for content_type in &content_types {
            let ranked = self
                .search_one_type(
                    trimmed,
                    query_vector.as_deref(),
                    content_type,
                    &options.filter,
                    options.similarity_threshold,
                    per_type_limit,
                    effective_mode,
                )
                .await?;
            results_by_type.insert(content_type.clone(), ranked);
        }

        let total_results: usize = results_by_type.values().map(Vec::len).sum();

        let search_suggestions = if total_results < SUGGESTION_FLOOR {
            self.sparse_result_suggestions(trimmed).await
        } else {
            Vec::new()
        };

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.record(processing_time_ms);

        self.spawn_log(NewQueryLogEntry {
            query_text: trimmed.to_string(),
            mode: effective_mode.as_str().to_string(),
            results_found: total_results as i64,
            response_time_ms: processing_time_ms,
            user_id: options.user_id.clone(),
            project_id: options.project_id.clone(),
        });

        Ok(HybridSearchOutcome {
            query: trimmed.to_string(),
            search_mode: effective_mode,
            degraded,
            total_results,
            processing_time_ms,
            results_by_type,
            search_suggestions,
        })
    }

    /// Nearest stored neighbors of one record, by cosine similarity.
    ///
    /// Fails with `StoreError::NotFound` when the record does not exist or
    /// carries no embedding.
    pub async fn similar_to(
        &self,
        record_id: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, SearchError> {
        let anchor = self
            .pool
            .run(|conn| lookup_by_id(conn, record_id))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id} not found")))?;

        let query_vector = match self.capability.embedding_of(record_id) {
            Some(vector) => vector.clone(),
            None => anchor.embedding.clone().ok_or_else(|| {
                StoreError::NotFound(format!("record {record_id} has no embedding"))
            })?,
        };

        // Candidate pool is all embedded records; similarity ranking
        // happens in memory.
        let candidates = self
            .pool
            .run(|conn| records_with_embeddings(conn, &ContentFilter::default(), 10_000))
            .await?
            .into_iter()
            .filter(|record| record.id != record_id)
            .collect();

        Ok(similarity_search(&query_vector, candidates, threshold, limit))
    }

    #[allow(clippy::too_many_arguments)]
    async fn search_one_type(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        content_type: &str,
        base_filter: &ContentFilter,
        threshold: f32,
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<RankedResult>, SearchError> {
        let mut type_filter = base_filter.clone();
        type_filter.content_type = Some(content_type.to_string());

        let run_keyword = mode != SearchMode::Semantic;

        // Vector candidates come from the in-memory index; only hydration
        // touches the store, so it can join with the keyword query.
        let vector_hits: Vec<(String, f32)> = match query_vector {
            Some(vector) => self
                .capability
                .vector_search(vector, limit * 4)
                .unwrap_or_default()
                .into_iter()
                .filter(|(_, similarity)| *similarity >= threshold)
                .collect(),
            None => Vec::new(),
        };
        let vector_ids: Vec<String> = vector_hits.iter().map(|(id, _)| id.clone()).collect();
        let similarities: HashMap<String, f32> = vector_hits.into_iter().collect();

        let keyword_future = async {
            if run_keyword {
                self.pool
                    .run(|conn| keyword_query(conn, query, &type_filter, limit * 2))
                    .await
            } else {
                Ok(Vec::new())
            }
        };
        let hydrate_future = async {
            if vector_ids.is_empty() {
                Ok(Vec::new())
            } else {
                self.pool
                    .run(|conn| lookup_many(conn, &vector_ids, &type_filter))
                    .await
            }
        };
        let (keyword_hits, vector_records) = tokio::join!(keyword_future, hydrate_future);

        let keyword_hits = keyword_hits?;
        // Vector hydration failure degrades to partial results rather than
        // failing a request the keyword side can still answer.
        let vector_records = match vector_records {
            Ok(records) => records,
            Err(err) => {
                warn!("vector candidate hydration failed: {err}");
                Vec::new()
            }
        };

        let mut fused: HashMap<String, FusedCandidate> = HashMap::new();
        for record in vector_records {
            let similarity = similarities.get(&record.id).copied();
            fused.insert(
                record.id.clone(),
                FusedCandidate {
                    record,
                    semantic: similarity,
                    keyword: None,
                },
            );
        }
        for hit in keyword_hits {
            match fused.get_mut(&hit.record.id) {
                Some(candidate) => candidate.keyword = Some(hit.relevance),
                None => {
                    fused.insert(
                        hit.record.id.clone(),
                        FusedCandidate {
                            record: hit.record,
                            semantic: None,
                            keyword: Some(hit.relevance),
                        },
                    );
                }
            }
        }

        let weights = self.weights;
        let mut ranked: Vec<RankedResult> = fused
            .into_values()
            .map(|candidate| {
                let score = match mode {
                    SearchMode::Semantic => candidate.semantic.unwrap_or(0.0),
                    SearchMode::Keyword => candidate.keyword.unwrap_or(0.0),
                    SearchMode::Hybrid => {
                        weights.semantic * candidate.semantic.unwrap_or(0.0)
                            + weights.keyword * candidate.keyword.unwrap_or(0.0)
                    }
                }
                .clamp(0.0, 1.0);

                RankedResult {
                    snippet: generate_snippet(&candidate.record.body, query, DEFAULT_SNIPPET_LEN),
                    id: candidate.record.id,
                    title: candidate.record.title,
                    content_type: candidate.record.content_type,
                    score,
                    semantic_score: candidate.semantic,
                    keyword_score: candidate.keyword,
                    tags: candidate.record.tags,
                    metadata: candidate.record.metadata,
                    created_at: candidate.record.created_at,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.created_at.cmp(&a.created_at))
        });
        ranked.truncate(limit);

        Ok(ranked)
    }

    /// Up to ten alternative texts for a sparse result set, drawn from
    /// recently popular logged queries and loosely matching titles.
    async fn sparse_result_suggestions(&self, query: &str) -> Vec<SearchSuggestion> {
        let mut suggestions: Vec<SearchSuggestion> = Vec::new();
        let query_lower = query.to_lowercase();
        let terms: Vec<String> = query_lower
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .map(str::to_string)
            .collect();

        let popular = self
            .pool
            .run(|conn| trending_queries(conn, 7, 1, SUGGESTION_CAP * 2))
            .await;
        match popular {
            Ok(popular) => {
                for entry in popular {
                    if entry.query_text != query_lower
                        && loosely_matches(&terms, &query_lower, &entry.query_text)
                    {
                        suggestions.push(SearchSuggestion {
                            text: entry.query_text,
                            reason: "recently popular query".to_string(),
                        });
                    }
                }
            }
            Err(err) => warn!("popular-query suggestions unavailable: {err}"),
        }

        if suggestions.len() < SUGGESTION_CAP {
            if let Some(first_term) = terms.first() {
                let titles = self
                    .pool
                    .run(|conn| title_matches(conn, first_term, None, SUGGESTION_CAP))
                    .await;
                match titles {
                    Ok(titles) => {
                        for title in titles {
                            if suggestions.iter().any(|s| s.text == title.title) {
                                continue;
                            }
                            suggestions.push(SearchSuggestion {
                                text: title.title,
                                reason: "similar title".to_string(),
                            });
                        }
                    }
                    Err(err) => warn!("title suggestions unavailable: {err}"),
                }
            }
        }

        suggestions.truncate(SUGGESTION_CAP);
        suggestions
    }

    /// Fire-and-forget query log write. Failures never reach the caller.
    fn spawn_log(&self, entry: NewQueryLogEntry) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(err) = pool.run(|conn| log_query(conn, &entry)).await {
                warn!("query log write failed: {err}");
            }
        });
    }
}

fn loosely_matches(terms: &[String], query_lower: &str, candidate: &str) -> bool {
    let candidate_lower = candidate.to_lowercase();
    candidate_lower.contains(query_lower)
        || query_lower.contains(&candidate_lower)
        || terms.iter().any(|term| candidate_lower.contains(term))
}
