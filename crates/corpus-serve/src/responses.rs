//! Request and response types for the search API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use corpus_search::{RankedResult, SearchMode, SearchOptions, SimilarityHit};
use corpus_store::{DailyCount, NewFeedback, PopularQuery};
use corpus_suggest::SuggestOptions;

/// Body of `POST /search/hybrid` and `POST /search/advanced`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Ranking options, all individually optional
    #[serde(flatten)]
    pub options: SearchOptions,
}

/// Response of `POST /search/advanced`: a trimmed view of the full
/// hybrid outcome for callers that only want the ranked lists.
#[derive(Debug, Clone, Serialize)]
pub struct AdvancedSearchResponse {
    /// Results grouped by content type
    pub results_by_type: BTreeMap<String, Vec<RankedResult>>,

    /// Result count across all content types
    pub total_results: usize,

    /// Mode that actually ran, after any downgrade
    pub search_mode: SearchMode,
}

/// Query parameters of `GET /search/autocomplete/intelligent`.
#[derive(Debug, Clone, Deserialize)]
pub struct AutocompleteParams {
    /// Partial query; empty or absent runs trending-only mode
    pub q: Option<String>,

    /// Maximum suggestions returned
    pub limit: Option<usize>,

    /// Enable the vector-similarity source
    pub include_semantic: Option<bool>,

    /// Enable the caller-history source
    pub include_history: Option<bool>,

    /// Enable the trending source
    pub include_trending: Option<bool>,

    /// Restrict title suggestions to one content type
    pub content_type: Option<String>,

    /// History scope and query-log correlation key
    pub user_id: Option<String>,

    /// History scope and query-log correlation key
    pub project_id: Option<String>,
}

impl AutocompleteParams {
    /// Convert query parameters into engine options.
    pub fn into_options(self) -> SuggestOptions {
        let defaults = SuggestOptions::default();
        SuggestOptions {
            limit: self.limit.unwrap_or(defaults.limit),
            include_semantic: self.include_semantic.unwrap_or(defaults.include_semantic),
            include_history: self.include_history.unwrap_or(defaults.include_history),
            include_trending: self.include_trending.unwrap_or(defaults.include_trending),
            content_type: self.content_type,
            user_id: self.user_id,
            project_id: self.project_id,
        }
    }
}

/// Query parameters of `GET /search/similar/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarParams {
    /// Minimum cosine similarity
    #[serde(rename = "similarity_threshold", alias = "threshold")]
    pub threshold: Option<f32>,

    /// Maximum neighbors returned
    #[serde(rename = "max_results", alias = "limit")]
    pub limit: Option<usize>,
}

/// One neighbor in the similar-records response.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarResult {
    /// Record identifier
    pub id: String,

    /// Record title
    pub title: String,

    /// Content kind of the record
    pub content_type: String,

    /// Cosine similarity against the anchor record
    pub similarity: f32,
}

impl From<SimilarityHit> for SimilarResult {
    fn from(hit: SimilarityHit) -> Self {
        Self {
            id: hit.record.id,
            title: hit.record.title,
            content_type: hit.record.content_type,
            similarity: hit.similarity,
        }
    }
}

/// Response of `GET /search/similar/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarResponse {
    /// Anchor record id
    pub record_id: String,

    /// Neighbors sorted by descending similarity
    pub results: Vec<SimilarResult>,

    /// Neighbor count
    pub total_results: usize,
}

/// Body of `POST /search/feedback`.
pub type FeedbackRequest = NewFeedback;

/// Response of `POST /search/feedback`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    /// Id of the stored feedback row
    pub feedback_id: i64,
}

/// Query parameters of `GET /search/autocomplete/analytics`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsParams {
    /// Restrict counts to one project
    pub project_id: Option<String>,

    /// Lookback window in days
    pub days: Option<i64>,
}

/// Response of `GET /search/autocomplete/analytics`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsResponse {
    /// Searches per day inside the window
    pub daily_counts: Vec<DailyCount>,

    /// Most frequent query texts inside the window
    pub popular_queries: Vec<PopularQuery>,

    /// Total searches inside the window
    pub total_searches: i64,

    /// Window size in days
    pub days: i64,
}

/// Response of `POST /search/autocomplete/clear-cache`.
#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    /// Number of cache entries removed
    pub cleared: usize,
}

/// Response of `GET /search/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "ok" once initialized, "initializing" before that
    pub status: String,

    /// Whether the startup gate has flipped
    pub initialized: bool,

    /// Crate version
    pub version: String,

    /// Searches served since startup
    pub searches_performed: u64,

    /// Mean search response time in milliseconds
    pub average_response_ms: f64,

    /// Entries currently held by the embedding cache
    pub embedding_cache_entries: usize,

    /// Whether vector ranking is available
    pub vector_index_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_minimal_body() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "kafka"}"#).unwrap();
        assert_eq!(request.query, "kafka");
        assert_eq!(request.options.mode, SearchMode::Hybrid);
        assert_eq!(request.options.max_results, 20);
        assert!(request.options.content_types.is_empty());
    }

    #[test]
    fn test_search_request_full_body() {
        let request: SearchRequest = serde_json::from_str(
            r#"{
                "query": "kafka",
                "mode": "semantic",
                "content_types": ["pattern"],
                "similarity_threshold": 0.5,
                "max_results": 6,
                "user_id": "u-1"
            }"#,
        )
        .unwrap();
        assert_eq!(request.options.mode, SearchMode::Semantic);
        assert_eq!(request.options.content_types, vec!["pattern".to_string()]);
        assert_eq!(request.options.max_results, 6);
        assert_eq!(request.options.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_search_request_wire_field_names() {
        // The public request body uses "search_mode" and "filters"
        let request: SearchRequest = serde_json::from_str(
            r#"{
                "query": "kafka",
                "search_mode": "semantic",
                "filters": {"content_type": "pattern", "tags": ["infra"]}
            }"#,
        )
        .unwrap();
        assert_eq!(request.options.mode, SearchMode::Semantic);
        assert_eq!(request.options.filter.content_type.as_deref(), Some("pattern"));
        assert_eq!(request.options.filter.tags, vec!["infra".to_string()]);
    }

    #[test]
    fn test_similar_params_wire_field_names() {
        let params: SimilarParams =
            serde_json::from_str(r#"{"similarity_threshold": 0.9, "max_results": 3}"#).unwrap();
        assert_eq!(params.threshold, Some(0.9));
        assert_eq!(params.limit, Some(3));
    }

    #[test]
    fn test_autocomplete_params_defaults() {
        let params = AutocompleteParams {
            q: None,
            limit: None,
            include_semantic: None,
            include_history: None,
            include_trending: None,
            content_type: None,
            user_id: None,
            project_id: None,
        };
        let options = params.into_options();
        assert!(options.include_semantic);
        assert!(options.include_history);
        assert!(options.include_trending);
        assert_eq!(options.limit, SuggestOptions::default().limit);
    }
}
