//! corpus-store - Persistent Content Store
//!
//! SQLite-backed storage for searchable content records, the append-only
//! search query log, and relevance feedback capture.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Content records, filters and keyword queries.
pub mod content;
/// Store error taxonomy.
pub mod error;
/// Relevance feedback capture.
pub mod feedback;
/// Bounded connection pool with acquire timeout.
pub mod pool;
/// Append-only search query log and usage analytics.
pub mod query_log;
/// Database schema and connection management.
pub mod schema;

pub use content::{
    all_embeddings, embedding_from_text, embedding_to_text, keyword_query, lookup_by_id,
    lookup_many, popular_titles, records_with_embeddings, title_matches, upsert_record,
    ContentFilter, ContentRecord, KeywordHit, TitleMatch,
};
pub use error::StoreError;
pub use feedback::{feedback_count, record_feedback, NewFeedback};
pub use pool::{StorePool, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_POOL_SIZE};
pub use query_log::{
    daily_counts, history_queries, log_query, popular_queries, total_searches, trending_queries,
    DailyCount, NewQueryLogEntry, PopularQuery,
};
pub use schema::{Storage, StorageConfig};
