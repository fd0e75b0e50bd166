//! Server configuration from environment variables

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default host address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port number
pub const DEFAULT_PORT: u16 = 47310;

/// Default CORS origins (localhost for development)
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Default embedding dimensionality
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Default embedding call timeout in seconds
pub const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 5;

/// Default autocomplete cache TTL in seconds
pub const DEFAULT_AUTOCOMPLETE_TTL_SECS: u64 = 300;

/// Default autocomplete cache sweep interval in seconds
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Server configuration loaded from `CORPUS_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Path to SQLite database
    pub db_path: String,

    /// Log level for tracing
    pub log_level: String,

    /// Embedding provider endpoint (OpenAI-compatible)
    pub embedding_endpoint: String,

    /// Bearer token for the embedding provider
    pub embedding_api_key: Option<String>,

    /// Embedding model name
    pub embedding_model: String,

    /// Embedding dimensionality for this deployment
    pub embedding_dimension: usize,

    /// Per-call embedding timeout in seconds
    pub embedding_timeout_secs: u64,

    /// Embedding cache capacity
    pub embedding_cache_capacity: usize,

    /// Whether the in-memory vector index is enabled
    pub vector_index_enabled: bool,

    /// Hybrid fusion weight for the semantic term
    pub semantic_weight: f32,

    /// Hybrid fusion weight for the keyword term
    pub keyword_weight: f32,

    /// Autocomplete cache TTL in seconds
    pub autocomplete_ttl_secs: u64,

    /// Autocomplete cache sweep interval in seconds
    pub sweep_interval_secs: u64,

    /// Store connection pool size
    pub pool_size: usize,

    /// Pool acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            db_path: "corpus.db".to_string(),
            log_level: "info".to_string(),
            embedding_endpoint: "http://127.0.0.1:11434/v1/embeddings".to_string(),
            embedding_api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            embedding_timeout_secs: DEFAULT_EMBEDDING_TIMEOUT_SECS,
            embedding_cache_capacity: corpus_search::DEFAULT_CACHE_CAPACITY,
            vector_index_enabled: true,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            autocomplete_ttl_secs: DEFAULT_AUTOCOMPLETE_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            pool_size: corpus_store::DEFAULT_POOL_SIZE,
            acquire_timeout_secs: corpus_store::DEFAULT_ACQUIRE_TIMEOUT.as_secs(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CORPUS_HOST`, `CORPUS_PORT`, `CORPUS_DB_PATH`, `CORPUS_LOG_LEVEL`
    /// - `CORPUS_CORS_ORIGINS` - comma-separated origin list
    /// - `CORPUS_EMBEDDING_ENDPOINT`, `CORPUS_EMBEDDING_API_KEY`,
    ///   `CORPUS_EMBEDDING_MODEL`, `CORPUS_EMBEDDING_DIMENSION`,
    ///   `CORPUS_EMBEDDING_TIMEOUT_SECS`, `CORPUS_EMBEDDING_CACHE_CAPACITY`
    /// - `CORPUS_VECTOR_INDEX` - "true"/"false"
    /// - `CORPUS_SEMANTIC_WEIGHT`, `CORPUS_KEYWORD_WEIGHT`
    /// - `CORPUS_AUTOCOMPLETE_TTL_SECS`, `CORPUS_SWEEP_INTERVAL_SECS`
    /// - `CORPUS_POOL_SIZE`, `CORPUS_ACQUIRE_TIMEOUT_SECS`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CORPUS_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("CORPUS_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(origins) = std::env::var("CORPUS_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Ok(db_path) = std::env::var("CORPUS_DB_PATH") {
            config.db_path = db_path;
        }
        if let Ok(log_level) = std::env::var("CORPUS_LOG_LEVEL") {
            config.log_level = log_level;
        }
        if let Ok(endpoint) = std::env::var("CORPUS_EMBEDDING_ENDPOINT") {
            config.embedding_endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var("CORPUS_EMBEDDING_API_KEY") {
            config.embedding_api_key = Some(api_key);
        }
        if let Ok(model) = std::env::var("CORPUS_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(dimension) = std::env::var("CORPUS_EMBEDDING_DIMENSION") {
            if let Ok(dimension) = dimension.parse() {
                config.embedding_dimension = dimension;
            }
        }
        if let Ok(timeout) = std::env::var("CORPUS_EMBEDDING_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                config.embedding_timeout_secs = timeout;
            }
        }
        if let Ok(capacity) = std::env::var("CORPUS_EMBEDDING_CACHE_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                config.embedding_cache_capacity = capacity;
            }
        }
        if let Ok(enabled) = std::env::var("CORPUS_VECTOR_INDEX") {
            config.vector_index_enabled = matches!(enabled.as_str(), "true" | "1" | "yes");
        }
        if let Ok(weight) = std::env::var("CORPUS_SEMANTIC_WEIGHT") {
            if let Ok(weight) = weight.parse() {
                config.semantic_weight = weight;
            }
        }
        if let Ok(weight) = std::env::var("CORPUS_KEYWORD_WEIGHT") {
            if let Ok(weight) = weight.parse() {
                config.keyword_weight = weight;
            }
        }
        if let Ok(ttl) = std::env::var("CORPUS_AUTOCOMPLETE_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                config.autocomplete_ttl_secs = ttl;
            }
        }
        if let Ok(interval) = std::env::var("CORPUS_SWEEP_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse() {
                config.sweep_interval_secs = interval;
            }
        }
        if let Ok(size) = std::env::var("CORPUS_POOL_SIZE") {
            if let Ok(size) = size.parse() {
                config.pool_size = size;
            }
        }
        if let Ok(timeout) = std::env::var("CORPUS_ACQUIRE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                config.acquire_timeout_secs = timeout;
            }
        }

        config
    }

    /// Socket address for binding.
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Full server URL.
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be zero".to_string());
        }
        if self.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }
        if self.embedding_dimension == 0 {
            return Err("Embedding dimension must be greater than zero".to_string());
        }
        if self.pool_size == 0 {
            return Err("Pool size must be greater than zero".to_string());
        }
        if self.semantic_weight < 0.0 || self.keyword_weight < 0.0 {
            return Err("Fusion weights cannot be negative".to_string());
        }
        if self.semantic_weight + self.keyword_weight <= 0.0 {
            return Err("At least one fusion weight must be positive".to_string());
        }
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(format!(
                    "Invalid log level: {other}. Must be one of: trace, debug, info, warn, error"
                ));
            }
        }
        Ok(())
    }
}
