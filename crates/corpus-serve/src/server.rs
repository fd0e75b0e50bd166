//! Server instance management and the startup phase

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use corpus_search::{
    CachedEmbedder, EmbeddingProvider, HttpEmbeddingProvider, HybridRanker, HybridWeights,
    RankedQuery,
};
use corpus_store::{all_embeddings, StorageConfig, StorePool};
use corpus_suggest::{AutocompleteEngine, SuggestionCache};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::{create_router, AppState, Services};

/// Corpus HTTP server.
///
/// Startup is an explicit phase: the store opens, the vector capability
/// is probed, and the embedding provider is pinged before the readiness
/// gate flips. Requests arriving earlier get 503 `NOT_READY` instead of
/// triggering lazy initialization.
pub struct CorpusServer {
    config: ServerConfig,
    state: AppState,
}

impl CorpusServer {
    /// Create a server with the readiness gate closed.
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        if let Err(e) = config.validate() {
            return Err(ApiError::internal(format!("Invalid config: {e}")));
        }
        let state = AppState::uninitialized(config.clone());
        Ok(Self { config, state })
    }

    /// Shared handler state, exposed for tests.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the startup phase and flip the readiness gate.
    pub async fn initialize(&self) -> Result<(), ApiError> {
        let services = build_services(&self.config).await?;
        self.state.initialize(services);
        info!("startup complete, serving requests");
        Ok(())
    }

    /// Bind and serve until a shutdown signal arrives.
    ///
    /// The listener binds before initialization finishes so early health
    /// probes see the initializing state rather than connection refusal.
    pub async fn start(&self) -> Result<(), ApiError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(ApiError::internal)?;

        let cors = cors_layer(&self.config);
        let app = create_router()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind to {addr}: {e}");
            ApiError::internal(format!("Failed to bind to {addr}: {e}"))
        })?;

        info!("Server listening on: {}", self.config.server_url());

        let init_state = self.state.clone();
        let init_config = self.config.clone();
        tokio::spawn(async move {
            match build_services(&init_config).await {
                Ok(services) => {
                    init_state.initialize(services);
                    info!("startup complete, serving requests");
                }
                Err(e) => error!("startup failed, requests will stay NOT_READY: {e}"),
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {e}")))
    }
}

/// Build every request-path service from configuration.
async fn build_services(config: &ServerConfig) -> Result<Services, ApiError> {
    let storage_config = StorageConfig {
        db_path: config.db_path.clone(),
        embedding_dimension: Some(config.embedding_dimension),
        ..StorageConfig::default()
    };
    let pool = StorePool::open_with(
        storage_config,
        config.pool_size,
        Duration::from_secs(config.acquire_timeout_secs),
    )?;

    let embeddings = pool.run(|conn| all_embeddings(conn)).await?;
    let capability = Arc::new(RankedQuery::probe(
        config.vector_index_enabled,
        config.embedding_dimension,
        embeddings,
    ));

    let provider = HttpEmbeddingProvider::new(
        config.embedding_endpoint.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
        Duration::from_secs(config.embedding_timeout_secs),
    )
    .map_err(|e| ApiError::internal(format!("embedding client: {e}")))?;

    // Reachability probe is informational: a dead provider only disables
    // the semantic path per request, it never blocks startup.
    match provider.embed("startup reachability probe").await {
        Ok(_) => info!("embedding provider reachable at {}", config.embedding_endpoint),
        Err(e) => warn!("embedding provider unreachable, semantic path will degrade: {e}"),
    }

    let embedder = Arc::new(CachedEmbedder::new(
        Arc::new(provider),
        config.embedding_cache_capacity,
        Duration::from_secs(config.embedding_timeout_secs),
    ));

    let ranker = HybridRanker::new(
        pool.clone(),
        Arc::clone(&embedder),
        Arc::clone(&capability),
        HybridWeights {
            semantic: config.semantic_weight,
            keyword: config.keyword_weight,
        },
    );

    let cache = Arc::new(SuggestionCache::new(Duration::from_secs(
        config.autocomplete_ttl_secs,
    )));
    SuggestionCache::spawn_sweeper(
        &cache,
        Duration::from_secs(config.sweep_interval_secs.max(1)),
    );

    let engine = AutocompleteEngine::new(pool.clone(), embedder, capability, cache);

    Ok(Services {
        ranker,
        engine,
        pool,
        vector_index_enabled: config.vector_index_enabled,
    })
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Blocks until Ctrl+C or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            error!("Failed to install Ctrl+C handler");
        } else {
            info!("Received shutdown signal");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received TERM signal");
            }
            Err(e) => error!("Failed to install TERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_default_config() {
        let config = ServerConfig {
            db_path: "/tmp/corpus-serve-test.db".to_string(),
            ..ServerConfig::default()
        };
        let server = CorpusServer::new(config);
        assert!(server.is_ok());
        assert!(!server.unwrap().state().is_initialized());
    }

    #[test]
    fn test_server_rejects_invalid_config() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        assert!(CorpusServer::new(config).is_err());
    }
}
