//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use corpus_search::SearchError;
use corpus_store::StoreError;
use corpus_suggest::SuggestError;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API error with HTTP status code and a stable client-facing code
#[derive(Debug, Clone, Serialize, Error)]
pub struct ApiError {
    /// HTTP status code
    #[serde(skip)]
    pub status: StatusCode,

    /// Error message
    pub message: String,

    /// Stable error code for client handling
    pub code: String,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// 400 Bad Request for malformed queries
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "INVALID_QUERY")
    }

    /// 400 Bad Request for invalid request bodies
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 404 Not Found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("Resource not found: {}", resource.into()),
            "NOT_FOUND",
        )
    }

    /// 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "INTERNAL_ERROR",
        )
    }

    /// 503 Service Unavailable
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message,
            "SERVICE_UNAVAILABLE",
        )
    }

    /// 503 returned by every route until startup completes
    pub fn not_ready() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service is still initializing",
            "NOT_READY",
        )
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(resource) => Self::not_found(resource),
            StoreError::InvalidFeedback(message) => Self::bad_request(message),
            StoreError::Unavailable(detail) => {
                error!("store unavailable: {detail}");
                Self::unavailable("Content store is unavailable")
            }
            other => {
                error!("store error: {other}");
                Self::internal("Content store error")
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery(message) => Self::invalid_query(message),
            SearchError::Embedding(embedding) => {
                error!("embedding provider failure: {embedding}");
                Self::unavailable(embedding.to_string())
            }
            SearchError::Store(store) => store.into(),
        }
    }
}

impl From<SuggestError> for ApiError {
    fn from(err: SuggestError) -> Self {
        match err {
            SuggestError::Store(store) => store.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{:?}] [{}] {}", self.status, self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message,
            "code": self.code,
        }));

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_search::EmbeddingError;

    #[test]
    fn test_invalid_query_maps_to_400() {
        let error = ApiError::from(SearchError::InvalidQuery("empty".to_string()));
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "INVALID_QUERY");
    }

    #[test]
    fn test_store_unavailable_maps_to_503_generic_message() {
        let error = ApiError::from(StoreError::Unavailable("pool exhausted".to_string()));
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code, "SERVICE_UNAVAILABLE");
        // Internal detail stays out of the client message.
        assert!(!error.message.contains("pool exhausted"));
    }

    #[test]
    fn test_missing_record_maps_to_404() {
        let error = ApiError::from(SearchError::Store(StoreError::NotFound(
            "record x".to_string(),
        )));
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.code, "NOT_FOUND");
    }

    #[test]
    fn test_embedding_failure_maps_to_503() {
        let error = ApiError::from(SearchError::Embedding(EmbeddingError::Unavailable(
            "timed out".to_string(),
        )));
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_ready_code() {
        let error = ApiError::not_ready();
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code, "NOT_READY");
    }

    #[test]
    fn test_into_response_preserves_status() {
        let response = ApiError::invalid_query("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
