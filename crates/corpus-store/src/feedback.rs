// Relevance feedback capture

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Accepted feedback kinds.
const FEEDBACK_TYPES: &[&str] = &["relevant", "irrelevant", "clicked"];

/// Feedback about one search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedback {
    /// Query the result was returned for
    pub search_query: String,

    /// Id of the rated content record
    pub result_id: String,

    /// "relevant" | "irrelevant" | "clicked"
    pub feedback_type: String,

    /// Optional 1-5 rating
    pub rating: Option<i64>,
}

/// Validate and store one feedback entry, returning its id.
pub fn record_feedback(conn: &Connection, feedback: &NewFeedback) -> Result<i64, StoreError> {
    if feedback.search_query.trim().is_empty() {
        return Err(StoreError::InvalidFeedback(
            "search_query must not be empty".to_string(),
        ));
    }
    if !FEEDBACK_TYPES.contains(&feedback.feedback_type.as_str()) {
        return Err(StoreError::InvalidFeedback(format!(
            "unknown feedback_type '{}'",
            feedback.feedback_type
        )));
    }
    if let Some(rating) = feedback.rating {
        if !(1..=5).contains(&rating) {
            return Err(StoreError::InvalidFeedback(format!(
                "rating out of range: {rating}"
            )));
        }
    }

    conn.execute(
        "INSERT INTO search_feedback
            (search_query, result_id, feedback_type, rating, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            feedback.search_query,
            feedback.result_id,
            feedback.feedback_type,
            feedback.rating,
            Utc::now().timestamp(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Number of feedback rows for a result id.
pub fn feedback_count(conn: &Connection, result_id: &str) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM search_feedback WHERE result_id = ?1",
        params![result_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
