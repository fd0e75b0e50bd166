//! HTTP handlers for the search API

use axum::{
    extract::{Path, Query, State},
    Json, Router,
};
use std::sync::{Arc, OnceLock};
use tracing::info;

use corpus_search::{HybridRanker, HybridSearchOutcome};
use corpus_store::{daily_counts, popular_queries, record_feedback, total_searches, StorePool};
use corpus_suggest::{AutocompleteEngine, AutocompleteOutcome};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::responses::{
    AdvancedSearchResponse, AnalyticsParams, AnalyticsResponse, AutocompleteParams,
    ClearCacheResponse, FeedbackRequest, FeedbackResponse, HealthResponse, SearchRequest,
    SimilarParams, SimilarResponse, SimilarResult,
};

/// Default lookback window for the analytics endpoint, in days.
const DEFAULT_ANALYTICS_DAYS: i64 = 30;

/// Default neighbor count for the similar-records endpoint.
const DEFAULT_SIMILAR_LIMIT: usize = 10;

/// Default similarity threshold for the similar-records endpoint.
const DEFAULT_SIMILAR_THRESHOLD: f32 = 0.7;

/// Everything the request path needs, built once at startup.
pub struct Services {
    /// Hybrid search pipeline
    pub ranker: HybridRanker,

    /// Autocomplete engine
    pub engine: AutocompleteEngine,

    /// Store pool for the analytics and feedback endpoints
    pub pool: StorePool,

    /// Whether vector ranking is available on this deployment
    pub vector_index_enabled: bool,
}

/// State shared across all handlers.
///
/// Services are absent until startup completes; every route except
/// health answers 503 `NOT_READY` until the gate flips.
#[derive(Clone)]
pub struct AppState {
    services: Arc<OnceLock<Arc<Services>>>,
    /// Immutable server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// State with the readiness gate still closed.
    pub fn uninitialized(config: ServerConfig) -> Self {
        Self {
            services: Arc::new(OnceLock::new()),
            config: Arc::new(config),
        }
    }

    /// Flip the readiness gate. Later calls are ignored.
    pub fn initialize(&self, services: Services) {
        let _ = self.services.set(Arc::new(services));
    }

    /// True once startup has completed.
    pub fn is_initialized(&self) -> bool {
        self.services.get().is_some()
    }

    fn services(&self) -> ApiResult<Arc<Services>> {
        self.services
            .get()
            .cloned()
            .ok_or_else(ApiError::not_ready)
    }
}

/// POST /search/hybrid - fused keyword + semantic search
pub async fn hybrid_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<HybridSearchOutcome>> {
    let services = state.services()?;
    let outcome = services
        .ranker
        .search(&request.query, &request.options)
        .await?;
    Ok(Json(outcome))
}

/// POST /search/advanced - single-mode search with a trimmed response
pub async fn advanced_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<AdvancedSearchResponse>> {
    let services = state.services()?;
    let outcome = services
        .ranker
        .search(&request.query, &request.options)
        .await?;
    Ok(Json(AdvancedSearchResponse {
        results_by_type: outcome.results_by_type,
        total_results: outcome.total_results,
        search_mode: outcome.search_mode,
    }))
}

/// GET /search/autocomplete/intelligent - prioritized suggestions
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> ApiResult<Json<AutocompleteOutcome>> {
    let services = state.services()?;
    let partial = params.q.clone().unwrap_or_default();
    let options = params.into_options();
    let outcome = services.engine.suggest(&partial, &options).await?;
    Ok(Json(outcome))
}

/// GET /search/similar/:id - nearest neighbors of a stored record
pub async fn similar_records(
    Path(record_id): Path<String>,
    Query(params): Query<SimilarParams>,
    State(state): State<AppState>,
) -> ApiResult<Json<SimilarResponse>> {
    let services = state.services()?;
    let threshold = params.threshold.unwrap_or(DEFAULT_SIMILAR_THRESHOLD);
    let limit = params.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);

    let hits = services.ranker.similar_to(&record_id, threshold, limit).await?;
    let results: Vec<SimilarResult> = hits.into_iter().map(SimilarResult::from).collect();
    Ok(Json(SimilarResponse {
        record_id,
        total_results: results.len(),
        results,
    }))
}

/// POST /search/feedback - store relevance feedback for a result
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<Json<FeedbackResponse>> {
    let services = state.services()?;
    let feedback_id = services
        .pool
        .run(|conn| record_feedback(conn, &request))
        .await?;
    info!("stored feedback {feedback_id} for result {}", request.result_id);
    Ok(Json(FeedbackResponse { feedback_id }))
}

/// GET /search/autocomplete/analytics - search usage analytics
pub async fn autocomplete_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<Json<AnalyticsResponse>> {
    let services = state.services()?;
    let days = params.days.unwrap_or(DEFAULT_ANALYTICS_DAYS).max(1);
    let project_id = params.project_id;

    let response = services
        .pool
        .run(|conn| {
            let scope = project_id.as_deref();
            Ok(AnalyticsResponse {
                daily_counts: daily_counts(conn, scope, days)?,
                popular_queries: popular_queries(conn, scope, days, 10)?,
                total_searches: total_searches(conn, scope, days)?,
                days,
            })
        })
        .await?;
    Ok(Json(response))
}

/// POST /search/autocomplete/clear-cache - drop every cached response
pub async fn clear_autocomplete_cache(
    State(state): State<AppState>,
) -> ApiResult<Json<ClearCacheResponse>> {
    let services = state.services()?;
    let cleared = services.engine.cache().clear();
    info!("cleared {cleared} autocomplete cache entries");
    Ok(Json(ClearCacheResponse { cleared }))
}

/// GET /search/health - service health and counters
///
/// The one route that answers before the readiness gate flips, so
/// orchestration can watch initialization progress.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let response = match state.services.get() {
        Some(services) => {
            let stats = services.ranker.stats().snapshot();
            HealthResponse {
                status: "ok".to_string(),
                initialized: true,
                version: env!("CARGO_PKG_VERSION").to_string(),
                searches_performed: stats.searches_performed,
                average_response_ms: stats.average_response_ms,
                embedding_cache_entries: services.ranker.embedder().cache_len(),
                vector_index_enabled: services.vector_index_enabled,
            }
        }
        None => HealthResponse {
            status: "initializing".to_string(),
            initialized: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
            searches_performed: 0,
            average_response_ms: 0.0,
            embedding_cache_entries: 0,
            vector_index_enabled: false,
        },
    };
    Json(response)
}

/// Create router with all API endpoints
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/search/hybrid", axum::routing::post(hybrid_search))
        .route("/search/advanced", axum::routing::post(advanced_search))
        .route(
            "/search/autocomplete/intelligent",
            axum::routing::get(autocomplete),
        )
        .route("/search/similar/:id", axum::routing::get(similar_records))
        .route("/search/feedback", axum::routing::post(submit_feedback))
        .route(
            "/search/autocomplete/analytics",
            axum::routing::get(autocomplete_analytics),
        )
        .route(
            "/search/autocomplete/clear-cache",
            axum::routing::post(clear_autocomplete_cache),
        )
        .route("/search/health", axum::routing::get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_state_is_not_ready() {
        let state = AppState::uninitialized(ServerConfig::default());
        assert!(!state.is_initialized());
        match state.services() {
            Err(err) => {
                assert_eq!(err.code, "NOT_READY");
                assert_eq!(err.status, axum::http::StatusCode::SERVICE_UNAVAILABLE);
            }
            Ok(_) => panic!("services resolved before initialization"),
        }
    }
}
