// Store error taxonomy

use thiserror::Error;

/// Errors surfaced by the content store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable or connection pool exhausted.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// Requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Embedding length does not match the deployment dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the store was configured with
        expected: usize,
        /// Dimension of the rejected embedding
        got: usize,
    },

    /// Malformed feedback payload.
    #[error("invalid feedback: {0}")]
    InvalidFeedback(String),

    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Whether the error is a transient condition worth one internal retry.
    ///
    /// SQLITE_BUSY and SQLITE_LOCKED occur under concurrent writers in WAL
    /// mode and usually clear on the next attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = StoreError::DimensionMismatch {
            expected: 1536,
            got: 768,
        };
        let msg = err.to_string();
        assert!(msg.contains("1536"));
        assert!(msg.contains("768"));
    }

    #[test]
    fn test_unavailable_is_not_transient() {
        let err = StoreError::Unavailable("pool exhausted".to_string());
        assert!(!err.is_transient());
    }
}
