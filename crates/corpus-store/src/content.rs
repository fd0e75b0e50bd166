// Content records, filters and keyword queries

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::StoreError;

/// A unit of searchable knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Opaque unique identifier
    pub id: String,

    /// Short display title
    pub title: String,

    /// Primary searchable body
    pub body: String,

    /// Enumerated content kind, e.g. "decision-record" or "pattern"
    pub content_type: String,

    /// Free-form tags
    pub tags: Vec<String>,

    /// Open key/value metadata; schema not enforced by the core
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Fixed-length embedding vector; absent until computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Creation time, unix seconds
    pub created_at: i64,

    /// Last update time, unix seconds
    pub updated_at: i64,
}

/// Filter applied to content lookups and keyword queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFilter {
    /// Restrict to one content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Require at least one of these tags on the record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Only records created at or after this unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<i64>,

    /// Only records created at or before this unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<i64>,

    /// Metadata key/value equality constraints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<(String, serde_json::Value)>,
}

impl ContentFilter {
    /// Filter restricted to a single content type.
    pub fn for_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    /// Apply the in-memory portion of the filter (tags, metadata).
    ///
    /// Type and date constraints are pushed into SQL; tags and metadata
    /// live in JSON columns and are checked after hydration.
    pub fn matches(&self, record: &ContentRecord) -> bool {
        if !self.tags.is_empty() {
            let record_tags: HashSet<&str> = record.tags.iter().map(String::as_str).collect();
            if !self.tags.iter().any(|t| record_tags.contains(t.as_str())) {
                return false;
            }
        }

        for (key, expected) in &self.metadata {
            match record.metadata.get(key) {
                Some(value) if value == expected => {}
                _ => return false,
            }
        }

        true
    }
}

/// A keyword query hit with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordHit {
    /// Matched record
    pub record: ContentRecord,

    /// Relevance score in [0, 1]
    pub relevance: f32,
}

/// Title matched against a partial query, for autocomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleMatch {
    /// Record identifier
    pub id: String,

    /// Matched title text
    pub title: String,

    /// Content kind of the record
    pub content_type: String,

    /// True when the title starts with the partial query
    pub prefix: bool,
}

/// Escape `%`, `_` and `\` in user text bound into a `LIKE ... ESCAPE '\'`
/// pattern, so query text matches literally instead of as wildcards.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Serialize an embedding for the store boundary: `[0.1,0.2,0.3]`.
pub fn embedding_to_text(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Parse an embedding from its bracketed text form.
///
/// Returns `None` for malformed input rather than failing the row.
pub fn embedding_from_text(text: &str) -> Option<Vec<f32>> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    let tags_json: String = row.get("tags")?;
    let metadata_json: String = row.get("metadata")?;
    let embedding_text: Option<String> = row.get("embedding")?;

    Ok(ContentRecord {
        id: row.get("id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        content_type: row.get("content_type")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        embedding: embedding_text.as_deref().and_then(embedding_from_text),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Insert or replace a content record.
///
/// Ingestion happens outside the request path; this entry point exists for
/// operational backfill and tests. When `expected_dimension` is set, an
/// embedding of any other length is rejected. [`crate::Storage::upsert`]
/// wraps this with the deployment's configured dimension.
pub fn upsert_record(
    conn: &Connection,
    record: &ContentRecord,
    expected_dimension: Option<usize>,
) -> Result<(), StoreError> {
    if let (Some(expected), Some(embedding)) = (expected_dimension, record.embedding.as_ref()) {
        if embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: embedding.len(),
            });
        }
    }

    let tags_json = serde_json::to_string(&record.tags).unwrap_or_else(|_| "[]".to_string());
    let metadata_json =
        serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());
    let embedding_text = record.embedding.as_deref().map(embedding_to_text);

    conn.execute(
        "INSERT OR REPLACE INTO content_records
            (id, title, body, content_type, tags, metadata, embedding, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id,
            record.title,
            record.body,
            record.content_type,
            tags_json,
            metadata_json,
            embedding_text,
            record.created_at,
            record.updated_at,
        ],
    )?;

    Ok(())
}

/// Look up a single record by id.
pub fn lookup_by_id(conn: &Connection, id: &str) -> Result<Option<ContentRecord>, StoreError> {
    let record = conn
        .query_row(
            "SELECT id, title, body, content_type, tags, metadata, embedding, created_at, updated_at
             FROM content_records WHERE id = ?1",
            params![id],
            record_from_row,
        )
        .optional()?;

    Ok(record)
}

/// Keyword query using the store's text primitive.
///
/// Fetches LIKE candidates over title and body, then scores them with term
/// overlap relevance in [0, 1]. A full-phrase match in the title boosts the
/// score by 1.5x (capped at 1.0). Tag and metadata constraints are applied
/// after hydration.
pub fn keyword_query(
    conn: &Connection,
    query: &str,
    filter: &ContentFilter,
    limit: usize,
) -> Result<Vec<KeywordHit>, StoreError> {
    let term = query.trim().to_lowercase();
    if term.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", escape_like(&term));
    // Overfetch to leave room for post-hydration tag/metadata filtering.
    let candidate_limit = (limit * 4).max(50) as i64;

    let mut sql = String::from(
        "SELECT id, title, body, content_type, tags, metadata, embedding, created_at, updated_at
         FROM content_records
         WHERE (title LIKE ?1 ESCAPE '\\' OR body LIKE ?1 ESCAPE '\\')",
    );
    let mut bindings: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(pattern)];

    if let Some(content_type) = &filter.content_type {
        bindings.push(Box::new(content_type.clone()));
        sql.push_str(&format!(" AND content_type = ?{}", bindings.len()));
    }
    if let Some(after) = filter.created_after {
        bindings.push(Box::new(after));
        sql.push_str(&format!(" AND created_at >= ?{}", bindings.len()));
    }
    if let Some(before) = filter.created_before {
        bindings.push(Box::new(before));
        sql.push_str(&format!(" AND created_at <= ?{}", bindings.len()));
    }

    bindings.push(Box::new(candidate_limit));
    sql.push_str(&format!(
        " ORDER BY created_at DESC LIMIT ?{}",
        bindings.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::ToSql> = bindings.iter().map(|b| b.as_ref()).collect();
    let records = stmt
        .query_map(params_ref.as_slice(), record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut hits: Vec<KeywordHit> = records
        .into_iter()
        .filter(|record| filter.matches(record))
        .map(|record| {
            let relevance = keyword_relevance(query, &record.title, &record.body);
            KeywordHit { record, relevance }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.record.created_at.cmp(&a.record.created_at))
    });
    hits.truncate(limit);

    Ok(hits)
}

/// Term-overlap relevance between a query and a title/body pair.
fn keyword_relevance(query: &str, title: &str, body: &str) -> f32 {
    let query_lower = query.trim().to_lowercase();
    let query_words: HashSet<&str> = query_lower.split_whitespace().collect();
    if query_words.is_empty() {
        return 0.0;
    }

    let text = format!("{} {}", title, body).to_lowercase();
    let text_words: HashSet<&str> = text.split_whitespace().collect();
    if text_words.is_empty() {
        return 0.0;
    }

    let matches = query_words.intersection(&text_words).count();
    let mut relevance = matches as f32 / query_words.len() as f32;

    // Phrase match in the title is a strong signal
    if title.to_lowercase().contains(&query_lower) {
        relevance *= 1.5;
    }

    relevance.min(1.0)
}

/// Titles loosely matching a partial query, for the direct-match source.
pub fn title_matches(
    conn: &Connection,
    partial: &str,
    content_type: Option<&str>,
    limit: usize,
) -> Result<Vec<TitleMatch>, StoreError> {
    let term = partial.trim().to_lowercase();
    if term.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", escape_like(&term));
    let mut matches = match content_type {
        Some(content_type) => {
            let mut stmt = conn.prepare(
                "SELECT id, title, content_type FROM content_records
                 WHERE title LIKE ?1 ESCAPE '\\' AND content_type = ?2
                 ORDER BY updated_at DESC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![pattern, content_type, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, title, content_type FROM content_records
                 WHERE title LIKE ?1 ESCAPE '\\'
                 ORDER BY updated_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    }
    .into_iter()
    .map(|(id, title, content_type)| {
        let prefix = title.to_lowercase().starts_with(&term);
        TitleMatch {
            id,
            title,
            content_type,
            prefix,
        }
    })
    .collect::<Vec<_>>();

    // Prefix matches first, then recency order from SQL is preserved
    matches.sort_by(|a, b| b.prefix.cmp(&a.prefix));

    Ok(matches)
}

/// Recently updated titles, used to pad trending suggestions.
pub fn popular_titles(conn: &Connection, limit: usize) -> Result<Vec<TitleMatch>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content_type FROM content_records
         ORDER BY updated_at DESC LIMIT ?1",
    )?;
    let matches = stmt
        .query_map(params![limit as i64], |row| {
            Ok(TitleMatch {
                id: row.get(0)?,
                title: row.get(1)?,
                content_type: row.get(2)?,
                prefix: false,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(matches)
}

/// All stored embeddings, for building the in-memory vector index at startup.
pub fn all_embeddings(conn: &Connection) -> Result<Vec<(String, Vec<f32>)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, embedding FROM content_records WHERE embedding IS NOT NULL",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, text)| embedding_from_text(&text).map(|embedding| (id, embedding)))
        .collect())
}

/// Records of the given types carrying embeddings, for similarity candidates.
pub fn records_with_embeddings(
    conn: &Connection,
    filter: &ContentFilter,
    limit: usize,
) -> Result<Vec<ContentRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT id, title, body, content_type, tags, metadata, embedding, created_at, updated_at
         FROM content_records WHERE embedding IS NOT NULL",
    );
    let mut bindings: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(content_type) = &filter.content_type {
        bindings.push(Box::new(content_type.clone()));
        sql.push_str(&format!(" AND content_type = ?{}", bindings.len()));
    }
    if let Some(after) = filter.created_after {
        bindings.push(Box::new(after));
        sql.push_str(&format!(" AND created_at >= ?{}", bindings.len()));
    }
    if let Some(before) = filter.created_before {
        bindings.push(Box::new(before));
        sql.push_str(&format!(" AND created_at <= ?{}", bindings.len()));
    }

    bindings.push(Box::new(limit as i64));
    sql.push_str(&format!(" LIMIT ?{}", bindings.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::ToSql> = bindings.iter().map(|b| b.as_ref()).collect();
    let records = stmt
        .query_map(params_ref.as_slice(), record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
}

/// Hydrate records for a list of ids, preserving the input order.
pub fn lookup_many(
    conn: &Connection,
    ids: &[String],
    filter: &ContentFilter,
) -> Result<Vec<ContentRecord>, StoreError> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = lookup_by_id(conn, id)? {
            let type_ok = filter
                .content_type
                .as_deref()
                .map_or(true, |t| record.content_type == t);
            let after_ok = filter.created_after.map_or(true, |a| record.created_at >= a);
            let before_ok = filter
                .created_before
                .map_or(true, |b| record.created_at <= b);
            if type_ok && after_ok && before_ok && filter.matches(&record) {
                out.push(record);
            }
        }
    }
    Ok(out)
}
