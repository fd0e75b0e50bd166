// Embedding provider contract and HTTP client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::EmbeddingError;

/// Maximum characters sent to the provider; longer input is truncated.
const MAX_EMBED_CHARS: usize = 8000;

/// Default per-call provider timeout.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(5);

/// Black-box text-to-vector provider.
///
/// Implementations may be slow or fail; callers are expected to recover by
/// downgrading to keyword-only search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate a fixed-dimension embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed dimensionality of every vector this provider returns.
    fn dimension(&self) -> usize;
}

/// Clean and bound text before sending it to the provider.
///
/// Collapses runs of whitespace; returns `None` for input that is empty
/// after cleaning. Input past the provider's practical token limit is
/// truncated with a trailing ellipsis.
pub fn prepare_text(text: &str) -> Option<String> {
    let clean: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.is_empty() {
        return None;
    }

    if clean.chars().count() > MAX_EMBED_CHARS {
        let truncated: String = clean.chars().take(MAX_EMBED_CHARS).collect();
        return Some(format!("{truncated}..."));
    }

    Some(clean)
}

/// Embedding provider speaking the OpenAI-compatible embeddings protocol.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    /// Create a provider for the given endpoint and model.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Unavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let prepared = prepare_text(text)
            .ok_or_else(|| EmbeddingError::InvalidInput("empty after cleaning".to_string()))?;

        let request = EmbeddingRequest {
            input: &prepared,
            model: &self.model,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Unavailable(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Unavailable(format!("malformed response: {e}")))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Unavailable("empty response data".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }

        debug!("generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_text_collapses_whitespace() {
        assert_eq!(
            prepare_text("  database \n\t migration  "),
            Some("database migration".to_string())
        );
    }

    #[test]
    fn test_prepare_text_empty() {
        assert_eq!(prepare_text(""), None);
        assert_eq!(prepare_text("   \n\t  "), None);
    }

    #[test]
    fn test_prepare_text_truncates_long_input() {
        let long = "word ".repeat(3000);
        let prepared = prepare_text(&long).unwrap();
        assert!(prepared.ends_with("..."));
        assert_eq!(prepared.chars().count(), MAX_EMBED_CHARS + 3);
    }
}
